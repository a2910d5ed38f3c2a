//! cert-manager certificate collection
//!
//! Certificates are a CRD, so they are listed through the dynamic API with a
//! statically known ApiResource and decoded straight off the returned objects.
//! `status.renewalTime` is absent until cert-manager has issued the
//! certificate; absent and malformed are different conditions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::api::{Api, DynamicObject, ListParams};
use kube::discovery::ApiResource;
use kube::{Client, ResourceExt};
use tracing::debug;

use super::{CertificateSummary, ClusterRecord, CollectError, Collector, CollectorKind};

const CERT_MANAGER_GROUP: &str = "cert-manager.io";
const CERT_MANAGER_VERSION: &str = "v1";
const CERTIFICATE_KIND: &str = "Certificate";
const CERTIFICATE_PLURAL: &str = "certificates";

/// Lists cert-manager certificates across all namespaces
#[derive(Debug, Default)]
pub struct CertificateCollector;

fn certificate_resource() -> ApiResource {
    ApiResource {
        group: CERT_MANAGER_GROUP.to_string(),
        version: CERT_MANAGER_VERSION.to_string(),
        kind: CERTIFICATE_KIND.to_string(),
        api_version: format!("{CERT_MANAGER_GROUP}/{CERT_MANAGER_VERSION}"),
        plural: CERTIFICATE_PLURAL.to_string(),
    }
}

#[async_trait]
impl Collector for CertificateCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Certificates
    }

    async fn collect(
        &self,
        client: &Client,
        record: &mut ClusterRecord,
    ) -> Result<(), CollectError> {
        let api: Api<DynamicObject> = Api::all_with(client.clone(), &certificate_resource());
        let list = api.list(&ListParams::default()).await?;

        record.certificates = list
            .items
            .iter()
            .map(certificate_summary)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Collected {} certificates from cluster '{}'",
            record.certificates.len(),
            record.name
        );
        Ok(())
    }
}

/// Decode one listed object into its summary
fn certificate_summary(obj: &DynamicObject) -> Result<CertificateSummary, CollectError> {
    Ok(CertificateSummary {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        renew_time: renewal_time(obj)?,
    })
}

fn renewal_time(obj: &DynamicObject) -> Result<Option<DateTime<Utc>>, CollectError> {
    let Some(raw) = obj.data.pointer("/status/renewalTime") else {
        return Ok(None);
    };
    let raw = raw.as_str().ok_or_else(|| {
        CollectError::Decode(format!(
            "certificate '{}': renewalTime is not a string",
            obj.name_any()
        ))
    })?;
    let parsed = DateTime::parse_from_rfc3339(raw).map_err(|e| {
        CollectError::Decode(format!(
            "certificate '{}': renewalTime '{raw}': {e}",
            obj.name_any()
        ))
    })?;
    Ok(Some(parsed.with_timezone(&Utc)))
}
