//! Deployment collection from the target namespace

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use tracing::debug;

use super::{ClusterRecord, CollectError, Collector, CollectorKind};

/// Lists deployments in one fixed namespace, recording their names
///
/// The count the report cares about falls out of the name list.
pub struct DeploymentCollector {
    namespace: String,
}

impl DeploymentCollector {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Collector for DeploymentCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Deployments
    }

    async fn collect(
        &self,
        client: &Client,
        record: &mut ClusterRecord,
    ) -> Result<(), CollectError> {
        let api: Api<Deployment> = Api::namespaced(client.clone(), &self.namespace);
        let list = api.list(&ListParams::default()).await?;

        record.deployments = deployment_names(&list.items);
        debug!(
            "Cluster '{}' has {} deployments in namespace '{}'",
            record.name,
            record.deployments.len(),
            self.namespace
        );
        Ok(())
    }
}

/// Stable, sorted name list from a raw listing
fn deployment_names(items: &[Deployment]) -> Vec<String> {
    let mut names: Vec<String> = items.iter().map(|d| d.name_any()).collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn deployment(name: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_deployment_names_are_sorted() {
        let items = vec![deployment("zeta"), deployment("alpha"), deployment("mid")];
        assert_eq!(deployment_names(&items), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_empty_listing_yields_empty_names() {
        assert!(deployment_names(&[]).is_empty());
    }
}
