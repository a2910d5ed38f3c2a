//! Per-cluster collection worker
//!
//! One worker call runs one cluster end to end: resolve connection metadata,
//! build an authenticated client, then run each configured collector in
//! sequence. Failures degrade the record instead of aborting the cluster —
//! the scheduler always gets a record back, possibly with empty fields.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::client::ClientFactory;
use crate::collect::{ClusterRecord, Collector};
use crate::discovery::ClusterDiscovery;

use super::{CollectionError, CollectionStage};

/// One cluster's collection result: the record plus whatever went wrong
#[derive(Debug)]
pub struct ClusterOutcome {
    pub record: ClusterRecord,
    pub errors: Vec<CollectionError>,
}

impl ClusterOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Worker seam so the scheduler is testable without cloud or cluster APIs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterWorker: Send + Sync {
    /// Collect one cluster. Never fails outright; degradation lives in the
    /// outcome's error list.
    async fn collect_cluster(&self, name: &str, region: &str) -> ClusterOutcome;
}

/// Production worker wiring discovery, the client factory and the collectors
pub struct EksClusterWorker {
    discovery: Arc<dyn ClusterDiscovery>,
    factory: Arc<dyn ClientFactory>,
    collectors: Vec<Arc<dyn Collector>>,
    env: String,
    collector_timeout: Duration,
}

impl EksClusterWorker {
    pub fn new(
        discovery: Arc<dyn ClusterDiscovery>,
        factory: Arc<dyn ClientFactory>,
        collectors: Vec<Arc<dyn Collector>>,
        env: impl Into<String>,
        collector_timeout: Duration,
    ) -> Self {
        Self {
            discovery,
            factory,
            collectors,
            env: env.into(),
            collector_timeout,
        }
    }
}

#[async_trait]
impl ClusterWorker for EksClusterWorker {
    async fn collect_cluster(&self, name: &str, region: &str) -> ClusterOutcome {
        let mut record = ClusterRecord::new(name, &self.env, region);
        let mut errors = Vec::new();

        let identity = match self.discovery.describe_cluster(name, region).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Discovery failed for cluster '{}' in {}: {}", name, region, e);
                errors.push(CollectionError::new(
                    name,
                    region,
                    CollectionStage::Discovery,
                    e,
                ));
                return ClusterOutcome { record, errors };
            }
        };

        // Auth strictly precedes any collector; no retry on failure
        let client = match self.factory.make_client(&identity).await {
            Ok(client) => client,
            Err(e) => {
                warn!("Auth failed for cluster '{}' in {}: {}", name, region, e);
                errors.push(CollectionError::new(name, region, CollectionStage::Auth, e));
                return ClusterOutcome { record, errors };
            }
        };

        for collector in &self.collectors {
            let kind = collector.kind();
            match timeout(
                self.collector_timeout,
                collector.collect(&client, &mut record),
            )
            .await
            {
                Ok(Ok(())) => {
                    debug!("Collector {} finished for cluster '{}'", kind, name);
                }
                Ok(Err(e)) => {
                    warn!(
                        "Collector {} failed for cluster '{}' in {}: {}",
                        kind, name, region, e
                    );
                    errors.push(CollectionError::new(
                        name,
                        region,
                        CollectionStage::Fetch,
                        format!("collector {kind}: {e}"),
                    ));
                }
                Err(_) => {
                    warn!(
                        "Collector {} timed out for cluster '{}' in {} after {:?}",
                        kind, name, region, self.collector_timeout
                    );
                    errors.push(CollectionError::new(
                        name,
                        region,
                        CollectionStage::Fetch,
                        format!(
                            "collector {kind}: timed out after {:?}",
                            self.collector_timeout
                        ),
                    ));
                }
            }
        }

        ClusterOutcome { record, errors }
    }
}
