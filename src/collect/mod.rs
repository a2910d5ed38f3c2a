//! Collector seam and per-cluster record types
//!
//! A collector is a self-contained unit of work: given an authenticated
//! cluster client it fetches one category of resource data and merges the
//! result into the cluster's record. Collectors share no mutable state;
//! a failure stays scoped to the collector that produced it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

pub mod certificates;
pub mod deployments;
pub mod events;

pub use certificates::CertificateCollector;
pub use deployments::DeploymentCollector;
pub use events::EventCollector;

/// Errors from a single collector invocation
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("List request failed: {0}")]
    Api(#[from] kube::Error),

    #[error("Unexpected resource shape: {0}")]
    Decode(String),
}

/// The categories of resource data a scan can gather
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CollectorKind {
    /// cert-manager certificates across all namespaces
    Certificates,
    /// Deployments in the target namespace
    Deployments,
    /// Recent events across all namespaces
    Events,
}

impl std::fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CollectorKind::Certificates => "certificates",
            CollectorKind::Deployments => "deployments",
            CollectorKind::Events => "events",
        };
        write!(f, "{}", name)
    }
}

/// Summary of one cert-manager certificate resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    /// Certificate resource name
    pub name: String,
    /// Namespace the certificate lives in
    pub namespace: String,
    /// Next scheduled renewal; absent until the certificate has been issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renew_time: Option<DateTime<Utc>>,
}

/// One event observed within the recency window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// Event object name
    pub name: String,
    /// Namespace the event was recorded in
    pub namespace: String,
    /// Machine-readable reason, when the cluster reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Last time the event was seen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Everything collected for one cluster during a scan pass
///
/// Mutable only while its own worker runs; empty fields mean the matching
/// collector was not configured or degraded on failure. The coordinates are
/// in-memory attribution only: in the report file the cluster name is the
/// map key and env/region are carried by the file path, so a record with no
/// collected data serializes as `{}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClusterRecord {
    /// Cluster name as reported by discovery
    #[serde(skip)]
    pub name: String,
    /// Environment label the scan ran under
    #[serde(skip)]
    pub env: String,
    /// Cloud region hosting the cluster
    #[serde(skip)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<CertificateSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventSummary>,
}

impl ClusterRecord {
    /// Empty record carrying only the cluster's coordinates
    pub fn new(name: impl Into<String>, env: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: env.into(),
            region: region.into(),
            ..Self::default()
        }
    }
}

/// A unit of work that fetches one category of resource data from a cluster
///
/// This trait is the seam between the per-cluster worker and the Kubernetes
/// API: tests substitute mock collectors, production wires the concrete
/// implementations below.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Collector: Send + Sync {
    /// Which record field this collector populates
    fn kind(&self) -> CollectorKind;

    /// Fetch this collector's resource category and merge it into `record`
    async fn collect(&self, client: &Client, record: &mut ClusterRecord)
        -> Result<(), CollectError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_empty_record_serializes_as_empty_object() {
        let record = ClusterRecord::new("b", "qa", "us-west-2");
        let json = serde_json::to_value(&record).unwrap();

        // Name lives in the report's map key, env/region in the file path;
        // a degraded cluster must show up as a bare `{}`
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn test_certificate_summary_uses_camel_case_renew_time() {
        let summary = CertificateSummary {
            name: "cert1".to_string(),
            namespace: "ns1".to_string(),
            renew_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        };
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["name"], "cert1");
        assert_eq!(json["namespace"], "ns1");
        assert!(json["renewTime"].is_string());
        assert!(json.get("renew_time").is_none());
    }

    #[test]
    fn test_unissued_certificate_omits_renew_time() {
        let summary = CertificateSummary {
            name: "pending".to_string(),
            namespace: "ns1".to_string(),
            renew_time: None,
        };
        let json = serde_json::to_value(&summary).unwrap();

        assert!(json.get("renewTime").is_none());
    }

    #[test]
    fn test_record_serializes_collections_without_coordinates() {
        let mut record = ClusterRecord::new("a", "qa", "us-west-2");
        record.certificates.push(CertificateSummary {
            name: "cert1".to_string(),
            namespace: "ns1".to_string(),
            renew_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        });
        record.deployments.push("api-server".to_string());

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("name").is_none());
        assert!(json.get("env").is_none());
        assert!(json.get("region").is_none());
        assert_eq!(json["certificates"][0]["name"], "cert1");
        assert_eq!(json["deployments"][0], "api-server");
    }

    #[test]
    fn test_collector_kind_display_names() {
        assert_eq!(CollectorKind::Certificates.to_string(), "certificates");
        assert_eq!(CollectorKind::Deployments.to_string(), "deployments");
        assert_eq!(CollectorKind::Events.to_string(), "events");
    }
}
