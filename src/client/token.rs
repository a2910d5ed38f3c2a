//! Cluster-scoped bearer token derivation
//!
//! EKS access tokens are presigned STS GetCallerIdentity URLs: the URL is
//! SigV4 query-signed for the cluster's region with the cluster name bound
//! into the signed `x-k8s-aws-id` header, then base64url-encoded behind the
//! `k8s-aws-v1.` prefix. Tokens are short-lived and never cached; each
//! factory call derives a fresh one.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SignatureLocation, SigningSettings,
};
use aws_sigv4::sign::v4;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

#[cfg(test)]
use mockall::automock;

use super::ClientError;

/// Prefix the cluster API server expects on presigned-URL tokens
const TOKEN_PREFIX: &str = "k8s-aws-v1.";

/// Presign lifetime; the API server rejects URLs signed for longer
const TOKEN_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Header that scopes the signature to one cluster
const CLUSTER_ID_HEADER: &str = "x-k8s-aws-id";

/// A short-lived, cluster-scoped bearer token
#[derive(Clone)]
pub struct BearerToken {
    value: String,
}

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[cfg(test)]
    pub(crate) fn for_tests(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose credential material in logs
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Seam for credential exchange so the factory is testable without STS
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Derive a fresh bearer token scoped to one cluster
    async fn bearer_token(
        &self,
        cluster_name: &str,
        region: &str,
    ) -> Result<BearerToken, ClientError>;
}

/// Token provider backed by the ambient AWS credential chain
pub struct StsTokenProvider {
    credentials: SharedCredentialsProvider,
}

impl StsTokenProvider {
    pub fn new(credentials: SharedCredentialsProvider) -> Self {
        Self { credentials }
    }

    /// Pull the credential provider out of a loaded SDK configuration
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Result<Self, ClientError> {
        let credentials = sdk_config
            .credentials_provider()
            .ok_or(ClientError::NoCredentials)?;
        Ok(Self::new(credentials))
    }
}

#[async_trait]
impl TokenProvider for StsTokenProvider {
    async fn bearer_token(
        &self,
        cluster_name: &str,
        region: &str,
    ) -> Result<BearerToken, ClientError> {
        let credentials = self.credentials.provide_credentials().await.map_err(|e| {
            ClientError::Token {
                cluster: cluster_name.to_string(),
                message: format!("credential resolution failed: {e}"),
            }
        })?;

        let url = presign_caller_identity(credentials, cluster_name, region, SystemTime::now())?;
        Ok(BearerToken {
            value: format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(url)),
        })
    }
}

/// Query-sign a GetCallerIdentity request against the region-scoped STS
/// endpoint, binding the cluster name into the signed headers
fn presign_caller_identity(
    credentials: Credentials,
    cluster_name: &str,
    region: &str,
    now: SystemTime,
) -> Result<String, ClientError> {
    let token_err = |message: String| ClientError::Token {
        cluster: cluster_name.to_string(),
        message,
    };

    let host = format!("sts.{region}.amazonaws.com");
    let url = format!("https://{host}/?Action=GetCallerIdentity&Version=2011-06-15");

    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(TOKEN_EXPIRY);

    let identity = credentials.into();
    let params = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name("sts")
        .time(now)
        .settings(settings)
        .build()
        .map_err(|e| token_err(format!("signing parameters: {e}")))?
        .into();

    let headers = [("host", host.as_str()), (CLUSTER_ID_HEADER, cluster_name)];
    let signable = SignableRequest::new(
        "GET",
        url.clone(),
        headers.into_iter(),
        SignableBody::Bytes(&[]),
    )
    .map_err(|e| token_err(format!("signable request: {e}")))?;

    let (instructions, _signature) = sign(signable, &params)
        .map_err(|e| token_err(format!("signing failed: {e}")))?
        .into_parts();

    let mut request = http::Request::builder()
        .method("GET")
        .uri(url)
        .body(())
        .map_err(|e| token_err(format!("request assembly: {e}")))?;
    instructions.apply_to_request_http1x(&mut request);

    Ok(request.uri().to_string())
}
