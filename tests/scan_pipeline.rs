//! End-to-end scan pipeline tests
//!
//! The cloud and cluster edges are replaced with scripted fakes; everything
//! between them (worker, scheduler, writer) is the production wiring, so
//! these tests cover the full path from cluster listing to the report file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeZone;
use kube::Client;
use serde_json::json;

use eksaudit::cli::{scan_regions, ScanOutcome};
use eksaudit::client::{ClientError, ClientFactory};
use eksaudit::collect::{
    CertificateSummary, ClusterRecord, CollectError, Collector, CollectorKind,
};
use eksaudit::config::ScanConfig;
use eksaudit::discovery::{ClusterDiscovery, ClusterIdentity, DiscoveryError};
use eksaudit::report::ReportWriter;
use eksaudit::scheduler::{CollectionStage, EksClusterWorker, RegionScheduler};

fn init_crypto() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

fn stub_client() -> Client {
    let config = kube::Config::new("http://127.0.0.1:8080".parse().unwrap());
    Client::try_from(config).expect("stub client")
}

/// Discovery fake scripted with a fixed region-to-clusters layout
struct ScriptedDiscovery {
    clusters: BTreeMap<String, Vec<String>>,
    failing_regions: Vec<String>,
}

impl ScriptedDiscovery {
    fn new(clusters: &[(&str, &[&str])]) -> Self {
        Self {
            clusters: clusters
                .iter()
                .map(|(region, names)| {
                    (
                        region.to_string(),
                        names.iter().map(|n| n.to_string()).collect(),
                    )
                })
                .collect(),
            failing_regions: Vec::new(),
        }
    }

    fn with_failing_region(mut self, region: &str) -> Self {
        self.failing_regions.push(region.to_string());
        self
    }
}

#[async_trait]
impl ClusterDiscovery for ScriptedDiscovery {
    async fn list_regions(&self) -> Result<Vec<String>, DiscoveryError> {
        let mut regions: Vec<String> = self.clusters.keys().cloned().collect();
        regions.extend(self.failing_regions.iter().cloned());
        regions.sort();
        Ok(regions)
    }

    async fn list_clusters(&self, region: &str) -> Result<Vec<String>, DiscoveryError> {
        if self.failing_regions.iter().any(|r| r == region) {
            return Err(DiscoveryError::ListClusters {
                region: region.to_string(),
                message: "request throttled".to_string(),
            });
        }
        Ok(self.clusters.get(region).cloned().unwrap_or_default())
    }

    async fn describe_cluster(
        &self,
        name: &str,
        region: &str,
    ) -> Result<ClusterIdentity, DiscoveryError> {
        Ok(ClusterIdentity {
            name: name.to_string(),
            region: region.to_string(),
            endpoint: "https://abc.eks.amazonaws.com".to_string(),
            ca_data: "Zm9v".to_string(),
        })
    }
}

/// Factory fake that denies a fixed set of clusters and hands out an inert
/// client for the rest
struct DenyListFactory {
    deny: Vec<String>,
}

impl DenyListFactory {
    fn denying(names: &[&str]) -> Self {
        Self {
            deny: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ClientFactory for DenyListFactory {
    async fn make_client(&self, identity: &ClusterIdentity) -> Result<Client, ClientError> {
        if self.deny.contains(&identity.name) {
            return Err(ClientError::Token {
                cluster: identity.name.clone(),
                message: "access denied".to_string(),
            });
        }
        Ok(stub_client())
    }
}

/// Collector fake that reports one fixed certificate
struct StaticCertificates;

#[async_trait]
impl Collector for StaticCertificates {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Certificates
    }

    async fn collect(
        &self,
        _client: &Client,
        record: &mut ClusterRecord,
    ) -> Result<(), CollectError> {
        record.certificates.push(CertificateSummary {
            name: "cert1".to_string(),
            namespace: "ns1".to_string(),
            renew_time: Some(chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        });
        Ok(())
    }
}

fn scan_config(root: &Path) -> ScanConfig {
    let mut config = ScanConfig::default();
    config.output_root = root.to_path_buf();
    config.timeout = Duration::from_secs(5);
    config
}

/// Production worker and scheduler over the scripted edges
fn pipeline(
    discovery: Arc<ScriptedDiscovery>,
    deny: &[&str],
) -> (Arc<ScriptedDiscovery>, RegionScheduler) {
    let worker = EksClusterWorker::new(
        Arc::clone(&discovery) as Arc<dyn ClusterDiscovery>,
        Arc::new(DenyListFactory::denying(deny)),
        vec![Arc::new(StaticCertificates)],
        "qa",
        Duration::from_secs(5),
    );
    (discovery, RegionScheduler::new(Arc::new(worker), 4))
}

async fn run(
    discovery: Arc<ScriptedDiscovery>,
    deny: &[&str],
    root: &Path,
) -> anyhow::Result<ScanOutcome> {
    let (discovery, scheduler) = pipeline(discovery, deny);
    let writer = ReportWriter::new(root);
    let config = scan_config(root);
    Ok(scan_regions(&config, discovery.as_ref(), &scheduler, &writer).await?)
}

#[tokio::test]
async fn scan_writes_healthy_and_denied_clusters_side_by_side() -> anyhow::Result<()> {
    init_crypto();
    let dir = tempfile::tempdir()?;
    let discovery = Arc::new(ScriptedDiscovery::new(&[("us-west-2", &["a", "b"])]));

    let outcome = run(discovery, &["b"], dir.path()).await?;

    assert!(outcome.is_success());
    assert_eq!(outcome.cluster_count(), 2);
    assert_eq!(outcome.collection_errors.len(), 1);
    assert_eq!(outcome.collection_errors[0].cluster, "b");
    assert_eq!(outcome.collection_errors[0].region, "us-west-2");
    assert_eq!(outcome.collection_errors[0].stage, CollectionStage::Auth);

    // The denied cluster stays present as an empty record in the same file
    let body = std::fs::read_to_string(dir.path().join("qa/us-west-2/clusters.json"))?;
    let parsed: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(
        parsed,
        json!({
            "a": {
                "certificates": [
                    {
                        "name": "cert1",
                        "namespace": "ns1",
                        "renewTime": "2024-05-01T12:00:00Z"
                    }
                ]
            },
            "b": {}
        })
    );
    Ok(())
}

#[tokio::test]
async fn scan_of_empty_region_writes_empty_report_without_errors() -> anyhow::Result<()> {
    init_crypto();
    let dir = tempfile::tempdir()?;
    let discovery = Arc::new(ScriptedDiscovery::new(&[("eu-north-1", &[])]));

    let outcome = run(discovery, &[], dir.path()).await?;

    assert!(outcome.is_success());
    assert!(outcome.collection_errors.is_empty());
    assert_eq!(outcome.reports["eu-north-1"].len(), 0);

    let body = std::fs::read_to_string(dir.path().join("qa/eu-north-1/clusters.json"))?;
    assert_eq!(body, "{}");
    Ok(())
}

#[tokio::test]
async fn scan_skips_region_whose_cluster_list_fails() -> anyhow::Result<()> {
    init_crypto();
    let dir = tempfile::tempdir()?;
    let discovery = Arc::new(
        ScriptedDiscovery::new(&[("us-west-2", &["a"])]).with_failing_region("ap-east-1"),
    );

    let outcome = run(discovery, &[], dir.path()).await?;

    // The healthy region still lands; the failed one is recorded, not fatal
    assert!(outcome.is_success());
    assert_eq!(outcome.region_failures.len(), 1);
    assert_eq!(outcome.region_failures[0].region, "ap-east-1");
    assert!(outcome.reports.contains_key("us-west-2"));
    assert!(!outcome.reports.contains_key("ap-east-1"));
    assert!(dir.path().join("qa/us-west-2/clusters.json").is_file());
    assert!(!dir.path().join("qa/ap-east-1").exists());
    Ok(())
}

#[tokio::test]
async fn failed_persistence_keeps_report_in_memory() -> anyhow::Result<()> {
    init_crypto();
    let dir = tempfile::tempdir()?;
    // A file where the env directory belongs forces every write to fail
    std::fs::write(dir.path().join("qa"), b"blocker")?;
    let discovery = Arc::new(ScriptedDiscovery::new(&[("us-west-2", &["a", "b"])]));

    let outcome = run(discovery, &["b"], dir.path()).await?;

    assert!(!outcome.is_success());
    assert_eq!(outcome.persist_failures.len(), 1);
    assert_eq!(outcome.persist_failures[0].region, "us-west-2");
    assert!(outcome.written.is_empty());

    // Collected data survives for inspection even though the write failed
    let report = &outcome.reports["us-west-2"];
    assert_eq!(report.len(), 2);
    assert_eq!(report.get("a").unwrap().certificates.len(), 1);
    assert_eq!(outcome.collection_errors.len(), 1);
    Ok(())
}

#[tokio::test]
async fn rescan_overwrites_previous_report() -> anyhow::Result<()> {
    init_crypto();
    let dir = tempfile::tempdir()?;

    let first = Arc::new(ScriptedDiscovery::new(&[("us-west-2", &["a", "b"])]));
    run(first, &[], dir.path()).await?;

    let second = Arc::new(ScriptedDiscovery::new(&[("us-west-2", &["c"])]));
    run(second, &[], dir.path()).await?;

    let body = std::fs::read_to_string(dir.path().join("qa/us-west-2/clusters.json"))?;
    let parsed: serde_json::Value = serde_json::from_str(&body)?;
    let keys: Vec<&String> = parsed.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["c"]);
    Ok(())
}
