//! Command implementations for the CLI
//!
//! Commands return results and leave printing to the caller. The scan
//! pipeline itself is wired against trait objects so every stage can be
//! substituted in tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::client::{ClientError, ClientFactory, EksClientFactory, StsTokenProvider};
use crate::collect::{
    CertificateCollector, Collector, CollectorKind, DeploymentCollector, EventCollector,
};
use crate::config::{default_output_root, expand_output_root, AuthConfig, ScanConfig};
use crate::discovery::{load_sdk_config, ClusterDiscovery, DiscoveryError, EksDiscovery};
use crate::report::{ReportError, ReportWriter};
use crate::scheduler::{CollectionError, EksClusterWorker, RegionReport, RegionScheduler};

use super::ScanArgs;

/// Errors that abort a command outright
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

// ============================================================================
// Scan outcome
// ============================================================================

/// A region-scoped failure that did not abort the rest of the scan
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFailure {
    pub region: String,
    pub message: String,
}

/// Everything one scan produced. Reports stay in memory even when their
/// file could not be written, so callers can still inspect the data.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Region name to aggregated report, for every region that was scanned
    pub reports: BTreeMap<String, RegionReport>,
    /// Contained per-cluster failures across all regions
    pub collection_errors: Vec<CollectionError>,
    /// Regions skipped because their cluster list could not be fetched
    pub region_failures: Vec<RegionFailure>,
    /// Regions whose report could not be persisted
    pub persist_failures: Vec<RegionFailure>,
    /// Report files successfully written
    pub written: Vec<PathBuf>,
}

impl ScanOutcome {
    /// A scan succeeds when every scanned region's report landed on disk
    pub fn is_success(&self) -> bool {
        self.persist_failures.is_empty()
    }

    pub fn cluster_count(&self) -> usize {
        self.reports.values().map(RegionReport::len).sum()
    }
}

// ============================================================================
// Configuration assembly (pure)
// ============================================================================

/// Assemble the scan configuration from parsed arguments
pub fn scan_config_from_args(args: &ScanArgs, auth: AuthConfig) -> ScanConfig {
    let output_root = args
        .output_root
        .as_deref()
        .map(expand_output_root)
        .unwrap_or_else(default_output_root);

    ScanConfig {
        env: args.env.clone(),
        regions: args.regions.clone(),
        collectors: args.collectors.clone(),
        deployments_namespace: args.deployments_namespace.clone(),
        event_window_hours: args.event_window_hours,
        max_concurrency: args.max_concurrency,
        timeout: Duration::from_secs(args.timeout_secs),
        output_root,
        auth,
    }
}

/// Instantiate the configured collectors
pub fn build_collectors(config: &ScanConfig) -> Vec<Arc<dyn Collector>> {
    config
        .collectors
        .iter()
        .map(|kind| -> Arc<dyn Collector> {
            match kind {
                CollectorKind::Certificates => Arc::new(CertificateCollector),
                CollectorKind::Deployments => {
                    Arc::new(DeploymentCollector::new(config.deployments_namespace.clone()))
                }
                CollectorKind::Events => Arc::new(EventCollector::new(config.event_window_hours)),
            }
        })
        .collect()
}

// ============================================================================
// Scan pipeline
// ============================================================================

/// Explicit regions pass through; an empty list falls back to discovery
async fn resolve_regions(
    requested: &[String],
    discovery: &dyn ClusterDiscovery,
) -> CommandResult<Vec<String>> {
    if requested.is_empty() {
        Ok(discovery.list_regions().await?)
    } else {
        Ok(requested.to_vec())
    }
}

/// Scan every region in turn: list clusters, fan the workers out, persist
/// the report. A region whose cluster list cannot be fetched is skipped and
/// recorded; a report that cannot be written is kept in memory and recorded.
pub async fn scan_regions(
    config: &ScanConfig,
    discovery: &dyn ClusterDiscovery,
    scheduler: &RegionScheduler,
    writer: &ReportWriter,
) -> CommandResult<ScanOutcome> {
    let regions = resolve_regions(&config.regions, discovery).await?;
    let mut outcome = ScanOutcome::default();

    for region in regions {
        let clusters = match discovery.list_clusters(&region).await {
            Ok(clusters) => clusters,
            Err(e) => {
                warn!("Skipping region {}: {}", region, e);
                outcome.region_failures.push(RegionFailure {
                    region: region.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let (report, errors) = scheduler.collect_region(&region, clusters).await;
        outcome.collection_errors.extend(errors);

        match writer.write(&config.env, &region, &report) {
            Ok(path) => outcome.written.push(path),
            Err(e) => {
                error!("Failed to persist report for {}: {}", region, e);
                outcome.persist_failures.push(RegionFailure {
                    region: region.clone(),
                    message: e.to_string(),
                });
            }
        }

        outcome.reports.insert(region, report);
    }

    info!(
        "Scan finished: {} clusters across {} regions, {} contained failures",
        outcome.cluster_count(),
        outcome.reports.len(),
        outcome.collection_errors.len()
    );

    Ok(outcome)
}

// ============================================================================
// Command entry points
// ============================================================================

/// Wire the production pipeline and run a full scan
pub async fn run_scan(config: ScanConfig) -> CommandResult<ScanOutcome> {
    let sdk_config = load_sdk_config(&config.auth).await;

    let discovery: Arc<dyn ClusterDiscovery> = Arc::new(EksDiscovery::new(sdk_config.clone()));
    let tokens = StsTokenProvider::from_sdk_config(&sdk_config)?;
    let factory: Arc<dyn ClientFactory> = Arc::new(EksClientFactory::new(Arc::new(tokens)));

    let worker = EksClusterWorker::new(
        Arc::clone(&discovery),
        factory,
        build_collectors(&config),
        &config.env,
        config.timeout,
    );
    let scheduler = RegionScheduler::new(Arc::new(worker), config.max_concurrency);
    let writer = ReportWriter::new(config.output_root.clone());

    scan_regions(&config, discovery.as_ref(), &scheduler, &writer).await
}

/// Region name to cluster names, fail-fast since this is a plain listing
pub async fn list_clusters_by_region(
    discovery: &dyn ClusterDiscovery,
    requested: &[String],
) -> CommandResult<BTreeMap<String, Vec<String>>> {
    let regions = resolve_regions(requested, discovery).await?;
    let mut by_region = BTreeMap::new();
    for region in regions {
        let clusters = discovery.list_clusters(&region).await?;
        by_region.insert(region, clusters);
    }
    Ok(by_region)
}

/// List clusters per region using live discovery
pub async fn run_clusters(
    auth: AuthConfig,
    regions: Vec<String>,
) -> CommandResult<BTreeMap<String, Vec<String>>> {
    let sdk_config = load_sdk_config(&auth).await;
    let discovery = EksDiscovery::new(sdk_config);
    list_clusters_by_region(&discovery, &regions).await
}

/// List the regions a scan would cover
pub async fn run_regions(auth: AuthConfig) -> CommandResult<Vec<String>> {
    let sdk_config = load_sdk_config(&auth).await;
    let discovery = EksDiscovery::new(sdk_config);
    Ok(discovery.list_regions().await?)
}
