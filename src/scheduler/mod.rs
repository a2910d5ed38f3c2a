//! Region-scoped scheduling and aggregation
//!
//! The scheduler fans one worker task out per cluster, bounded by a
//! semaphore, then folds the outcomes into the region report as tasks
//! finish. Workers hand results back instead of writing into shared state,
//! so the report and the error list are owned by the scheduler alone.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::collect::ClusterRecord;

pub mod worker;

pub use worker::{ClusterOutcome, ClusterWorker, EksClusterWorker};

// ============================================================================
// Failure attribution
// ============================================================================

/// Pipeline stage a contained failure occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStage {
    /// Resolving cluster metadata from the cloud API
    Discovery,
    /// Minting credentials or constructing the cluster client
    Auth,
    /// Reading resources from inside the cluster
    Fetch,
}

impl fmt::Display for CollectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CollectionStage::Discovery => "discovery",
            CollectionStage::Auth => "auth",
            CollectionStage::Fetch => "fetch",
        };
        write!(f, "{label}")
    }
}

/// One contained failure, attributed to a cluster and a pipeline stage.
/// These accumulate in the scan outcome instead of aborting the run.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{stage} failed for cluster '{cluster}' in {region}: {cause}")]
pub struct CollectionError {
    pub cluster: String,
    pub region: String,
    pub stage: CollectionStage,
    pub cause: String,
}

impl CollectionError {
    pub fn new(
        cluster: impl Into<String>,
        region: impl Into<String>,
        stage: CollectionStage,
        cause: impl ToString,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            region: region.into(),
            stage,
            cause: cause.to_string(),
        }
    }
}

// ============================================================================
// Region report
// ============================================================================

/// Mapping of cluster name to collected record for one region.
///
/// Serializes as a bare JSON object so the report file reads as
/// `{"cluster-a": {...}, "cluster-b": {}}`. Keys stay sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionReport {
    clusters: BTreeMap<String, ClusterRecord>,
}

impl RegionReport {
    /// Insert a record keyed by its cluster name, replacing any previous one
    pub fn insert(&mut self, record: ClusterRecord) {
        self.clusters.insert(record.name.clone(), record);
    }

    pub fn get(&self, name: &str) -> Option<&ClusterRecord> {
        self.clusters.get(name)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn cluster_names(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &ClusterRecord> {
        self.clusters.values()
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Bounded fan-out scheduler for one region's clusters
pub struct RegionScheduler {
    worker: Arc<dyn ClusterWorker>,
    max_concurrency: usize,
}

impl RegionScheduler {
    pub fn new(worker: Arc<dyn ClusterWorker>, max_concurrency: usize) -> Self {
        Self {
            worker,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Collect every named cluster and return only once all workers finished.
    ///
    /// Every cluster ends up in the report: failed ones keep their empty
    /// record, and the failure is attributed in the returned error list.
    pub async fn collect_region(
        &self,
        region: &str,
        clusters: Vec<String>,
    ) -> (RegionReport, Vec<CollectionError>) {
        let mut report = RegionReport::default();
        let mut errors = Vec::new();

        if clusters.is_empty() {
            debug!("No clusters to collect in {}", region);
            return (report, errors);
        }

        info!(
            "Collecting {} clusters in {} ({} max in flight)",
            clusters.len(),
            region,
            self.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut names_by_task: HashMap<tokio::task::Id, String> = HashMap::new();

        for name in clusters {
            // Acquire before spawning so at most max_concurrency workers run
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let worker = Arc::clone(&self.worker);
            let region = region.to_string();
            let task_name = name.clone();
            let handle = tasks.spawn(async move {
                let _permit = permit;
                worker.collect_cluster(&task_name, &region).await
            });
            names_by_task.insert(handle.id(), name);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, outcome)) => {
                    errors.extend(outcome.errors);
                    report.insert(outcome.record);
                }
                Err(e) => {
                    // A worker vanished without an outcome; attribute it by
                    // task id so the cluster still shows up in the errors
                    let cluster = names_by_task
                        .get(&e.id())
                        .map(String::as_str)
                        .unwrap_or("unknown")
                        .to_string();
                    error!(
                        "Collection task for cluster '{}' in {} did not complete: {}",
                        cluster, region, e
                    );
                    errors.push(CollectionError::new(
                        cluster,
                        region,
                        CollectionStage::Fetch,
                        e,
                    ));
                }
            }
        }

        (report, errors)
    }
}
