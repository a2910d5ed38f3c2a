//! Authenticated cluster client construction
//!
//! The factory turns one cluster's identity into a kube client bound to
//! {endpoint, bearer token, CA trust}. The kubeconfig is assembled in memory
//! and never touches disk; the bearer token is derived fresh per call (see
//! [`token`]) because tokens are cluster-scoped and short-lived.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[cfg(test)]
use mockall::automock;

use crate::discovery::ClusterIdentity;

pub mod token;

pub use token::{BearerToken, StsTokenProvider, TokenProvider};

/// Connect timeout for cluster API calls
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout for cluster API calls
const READ_TIMEOUT: Duration = Duration::from_secs(30);

const PEM_CERTIFICATE_HEADER: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Errors while constructing an authenticated cluster client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No credentials provider in the loaded SDK configuration")]
    NoCredentials,

    #[error("Token derivation failed for cluster '{cluster}': {message}")]
    Token { cluster: String, message: String },

    #[error("Malformed CA data for cluster '{cluster}': {message}")]
    CaData { cluster: String, message: String },

    #[error("Malformed endpoint '{endpoint}': {message}")]
    Endpoint { endpoint: String, message: String },

    #[error("Client construction failed for cluster '{cluster}': {message}")]
    Construction { cluster: String, message: String },
}

/// Factory seam: identity in, authenticated client out
///
/// The worker only sees this trait; tests substitute a mock returning a
/// pre-built client, production wires [`EksClientFactory`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn make_client(&self, identity: &ClusterIdentity) -> Result<Client, ClientError>;
}

/// Production factory: fresh STS-derived token plus CA trust per cluster
pub struct EksClientFactory {
    tokens: Arc<dyn TokenProvider>,
}

impl EksClientFactory {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl ClientFactory for EksClientFactory {
    async fn make_client(&self, identity: &ClusterIdentity) -> Result<Client, ClientError> {
        validate_endpoint(&identity.endpoint)?;
        validate_ca_data(identity)?;

        let bearer = self
            .tokens
            .bearer_token(&identity.name, &identity.region)
            .await?;

        let construction = |message: String| ClientError::Construction {
            cluster: identity.name.clone(),
            message,
        };

        let rendered = build_kubeconfig(identity, &bearer)?;
        let kubeconfig: Kubeconfig =
            serde_yaml::from_str(&rendered).map_err(|e| construction(e.to_string()))?;

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| construction(e.to_string()))?;
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config).map_err(|e| construction(e.to_string()))?;
        debug!(
            "Built authenticated client for cluster '{}' in {}",
            identity.name, identity.region
        );
        Ok(client)
    }
}

/// Endpoints must be well-formed HTTPS URLs; anything else is a
/// misconfiguration, not something to paper over
fn validate_endpoint(endpoint: &str) -> Result<(), ClientError> {
    let parsed = Url::parse(endpoint).map_err(|e| ClientError::Endpoint {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;
    if parsed.scheme() != "https" {
        return Err(ClientError::Endpoint {
            endpoint: endpoint.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(())
}

/// The cloud API hands back base64-encoded PEM; verify both layers before
/// handing the material to the TLS stack
fn validate_ca_data(identity: &ClusterIdentity) -> Result<(), ClientError> {
    let decoded = STANDARD
        .decode(identity.ca_data.trim())
        .map_err(|e| ClientError::CaData {
            cluster: identity.name.clone(),
            message: format!("invalid base64: {e}"),
        })?;
    if !decoded.starts_with(PEM_CERTIFICATE_HEADER) {
        return Err(ClientError::CaData {
            cluster: identity.name.clone(),
            message: "decoded data is not PEM certificate material".to_string(),
        });
    }
    Ok(())
}

// Minimal kubeconfig document, serialized with the exact key spelling the
// Kubernetes config format uses (apiVersion / current-context /
// certificate-authority-data).

#[derive(Serialize)]
struct KubeconfigDoc {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<NamedCluster>,
    users: Vec<NamedUser>,
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    current_context: String,
}

#[derive(Serialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Serialize)]
struct ClusterEntry {
    server: String,
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: String,
}

#[derive(Serialize)]
struct NamedUser {
    name: String,
    user: UserEntry,
}

#[derive(Serialize)]
struct UserEntry {
    token: String,
}

#[derive(Serialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Serialize)]
struct ContextEntry {
    cluster: String,
    user: String,
}

/// Render a single-context kubeconfig for one cluster, in memory
fn build_kubeconfig(
    identity: &ClusterIdentity,
    bearer: &BearerToken,
) -> Result<String, ClientError> {
    let doc = KubeconfigDoc {
        api_version: "v1",
        kind: "Config",
        clusters: vec![NamedCluster {
            name: identity.name.clone(),
            cluster: ClusterEntry {
                server: identity.endpoint.clone(),
                certificate_authority_data: identity.ca_data.clone(),
            },
        }],
        users: vec![NamedUser {
            name: identity.name.clone(),
            user: UserEntry {
                token: bearer.as_str().to_string(),
            },
        }],
        contexts: vec![NamedContext {
            name: identity.name.clone(),
            context: ContextEntry {
                cluster: identity.name.clone(),
                user: identity.name.clone(),
            },
        }],
        current_context: identity.name.clone(),
    };

    serde_yaml::to_string(&doc).map_err(|e| ClientError::Construction {
        cluster: identity.name.clone(),
        message: format!("kubeconfig render: {e}"),
    })
}
