//! Cloud-side cluster discovery
//!
//! Thin wrappers over the regional EKS/EC2 APIs: enumerate enabled regions,
//! list cluster names page by page, and resolve one cluster's connection
//! metadata. Results are immutable for the rest of the scan pass.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_eks::config::Region;
use aws_sdk_eks::error::DisplayErrorContext;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::AuthConfig;

/// Page size for cluster listing requests
const LIST_CLUSTERS_PAGE_SIZE: i32 = 100;

/// DescribeRegions is account-global but still needs an endpoint to hit
const FALLBACK_DISCOVERY_REGION: &str = "us-east-1";

/// Errors raised while talking to the cloud control plane
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Region listing failed: {0}")]
    Regions(String),

    #[error("Cluster listing failed in {region}: {message}")]
    ListClusters { region: String, message: String },

    #[error("Describe failed for cluster '{name}' in {region}: {message}")]
    Describe {
        name: String,
        region: String,
        message: String,
    },

    #[error("Cluster '{name}' in {region} is missing {field} in its description")]
    IncompleteDescription {
        name: String,
        region: String,
        field: &'static str,
    },
}

/// Connection metadata for one cluster, resolved once per scan pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    /// Cluster name; also the audience the bearer token is scoped to
    pub name: String,
    /// Region hosting the control plane
    pub region: String,
    /// HTTPS endpoint of the API server
    pub endpoint: String,
    /// Cluster CA bundle, base64-encoded PEM exactly as the cloud API returns it
    pub ca_data: String,
}

/// Discovery seam: region and cluster enumeration plus identity resolution
///
/// The scan pipeline only sees this trait; tests substitute a mock, production
/// wires [`EksDiscovery`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterDiscovery: Send + Sync {
    /// All enabled regions for the account, sorted
    async fn list_regions(&self) -> Result<Vec<String>, DiscoveryError>;

    /// Names of all clusters in one region
    async fn list_clusters(&self, region: &str) -> Result<Vec<String>, DiscoveryError>;

    /// Connection metadata for one cluster
    async fn describe_cluster(
        &self,
        name: &str,
        region: &str,
    ) -> Result<ClusterIdentity, DiscoveryError>;
}

/// Load the base SDK configuration, honoring the credential mode
///
/// Dev mode with a named profile pins that profile; otherwise the default
/// provider chain applies (which itself honors `AWS_PROFILE`, env credentials
/// and instance roles).
pub async fn load_sdk_config(auth: &AuthConfig) -> aws_config::SdkConfig {
    debug!(
        "Loading AWS configuration (dev_mode={}, profile={:?})",
        auth.dev_mode, auth.profile
    );
    let loader = aws_config::defaults(BehaviorVersion::latest());
    let loader = match (&auth.profile, auth.dev_mode) {
        (Some(profile), true) => loader.profile_name(profile),
        _ => loader,
    };
    loader.load().await
}

/// EKS-backed discovery over the AWS SDK
pub struct EksDiscovery {
    sdk_config: aws_config::SdkConfig,
}

impl EksDiscovery {
    pub fn new(sdk_config: aws_config::SdkConfig) -> Self {
        Self { sdk_config }
    }

    fn eks_client(&self, region: &str) -> aws_sdk_eks::Client {
        let conf = aws_sdk_eks::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_eks::Client::from_conf(conf)
    }

    fn ec2_client(&self) -> aws_sdk_ec2::Client {
        if self.sdk_config.region().is_some() {
            aws_sdk_ec2::Client::new(&self.sdk_config)
        } else {
            let conf = aws_sdk_ec2::config::Builder::from(&self.sdk_config)
                .region(Region::new(FALLBACK_DISCOVERY_REGION))
                .build();
            aws_sdk_ec2::Client::from_conf(conf)
        }
    }
}

#[async_trait]
impl ClusterDiscovery for EksDiscovery {
    async fn list_regions(&self) -> Result<Vec<String>, DiscoveryError> {
        let resp = self
            .ec2_client()
            .describe_regions()
            .send()
            .await
            .map_err(|e| DiscoveryError::Regions(format!("{}", DisplayErrorContext(&e))))?;

        let mut regions: Vec<String> = resp
            .regions()
            .iter()
            .filter_map(|r| r.region_name().map(str::to_string))
            .collect();
        regions.sort();
        debug!("Discovered {} enabled regions", regions.len());
        Ok(regions)
    }

    async fn list_clusters(&self, region: &str) -> Result<Vec<String>, DiscoveryError> {
        let client = self.eks_client(region);
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let resp = client
                .list_clusters()
                .max_results(LIST_CLUSTERS_PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| DiscoveryError::ListClusters {
                    region: region.to_string(),
                    message: format!("{}", DisplayErrorContext(&e)),
                })?;

            names.extend(resp.clusters().iter().cloned());
            next_token = resp.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!("Found {} clusters in {}", names.len(), region);
        Ok(names)
    }

    async fn describe_cluster(
        &self,
        name: &str,
        region: &str,
    ) -> Result<ClusterIdentity, DiscoveryError> {
        let resp = self
            .eks_client(region)
            .describe_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| DiscoveryError::Describe {
                name: name.to_string(),
                region: region.to_string(),
                message: format!("{}", DisplayErrorContext(&e)),
            })?;

        let cluster = resp
            .cluster()
            .ok_or_else(|| DiscoveryError::IncompleteDescription {
                name: name.to_string(),
                region: region.to_string(),
                field: "cluster",
            })?;

        cluster_identity(name, region, cluster)
    }
}

/// Map a raw cluster description into the identity the pipeline consumes
fn cluster_identity(
    name: &str,
    region: &str,
    cluster: &aws_sdk_eks::types::Cluster,
) -> Result<ClusterIdentity, DiscoveryError> {
    let endpoint = cluster
        .endpoint()
        .ok_or_else(|| DiscoveryError::IncompleteDescription {
            name: name.to_string(),
            region: region.to_string(),
            field: "endpoint",
        })?;

    let ca_data = cluster
        .certificate_authority()
        .and_then(|ca| ca.data())
        .ok_or_else(|| DiscoveryError::IncompleteDescription {
            name: name.to_string(),
            region: region.to_string(),
            field: "certificateAuthority.data",
        })?;

    Ok(ClusterIdentity {
        name: cluster.name().unwrap_or(name).to_string(),
        region: region.to_string(),
        endpoint: endpoint.to_string(),
        ca_data: ca_data.to_string(),
    })
}
