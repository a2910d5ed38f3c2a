//! Scan configuration and credential-mode resolution
//!
//! Every knob arrives through an explicit CLI flag or environment variable;
//! nothing is a source constant. Precedence logic is kept in pure functions
//! so it stays unit-testable.

use std::path::PathBuf;
use std::time::Duration;

use crate::collect::CollectorKind;

/// Environment label stamped on every record when none is given
pub const DEFAULT_ENV_LABEL: &str = "qa";

/// Namespace the deployment collector reads when none is given
pub const DEFAULT_DEPLOYMENTS_NAMESPACE: &str = "kube-system";

/// Upper bound on concurrently collected clusters per region
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Per-collector call timeout, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Recency window for the event collector, in hours
pub const DEFAULT_EVENT_WINDOW_HOURS: i64 = 24;

/// Profile selector honored when dev mode is active
pub const ENV_AWS_PROFILE: &str = "AWS_PROFILE";

/// Mode flag: the value `dev` selects profile-based credential resolution
pub const ENV_DEV_MODE: &str = "DEV";

const DEV_MODE_VALUE: &str = "dev";

/// Default report root: ~/.eksaudit
pub fn default_output_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".eksaudit")
}

/// How cloud credentials are resolved for this run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthConfig {
    /// Named profile to load in dev mode
    pub profile: Option<String>,
    /// Interactive/development resolution (named profile) rather than
    /// ambient resolution (instance role, env credentials)
    pub dev_mode: bool,
}

impl AuthConfig {
    /// Resolve from explicit flags plus the process environment
    pub fn from_env(flag_profile: Option<String>, flag_dev: bool) -> Self {
        resolve_auth(
            flag_profile,
            flag_dev,
            std::env::var(ENV_AWS_PROFILE).ok(),
            std::env::var(ENV_DEV_MODE).ok(),
        )
    }
}

/// Precedence: explicit flags win over environment variables
pub fn resolve_auth(
    flag_profile: Option<String>,
    flag_dev: bool,
    env_profile: Option<String>,
    env_dev: Option<String>,
) -> AuthConfig {
    AuthConfig {
        profile: flag_profile.or(env_profile),
        dev_mode: flag_dev || env_dev.as_deref() == Some(DEV_MODE_VALUE),
    }
}

/// Expand `~` in a user-supplied output root
pub fn expand_output_root(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Everything one scan pass needs to know
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Environment label stamped on records and used in the output path
    pub env: String,
    /// Regions to scan; empty means discover all enabled regions
    pub regions: Vec<String>,
    /// Which collectors to run per cluster
    pub collectors: Vec<CollectorKind>,
    /// Namespace the deployment collector targets
    pub deployments_namespace: String,
    /// Recency window for the event collector
    pub event_window_hours: i64,
    /// Cap on in-flight cluster workers per region
    pub max_concurrency: usize,
    /// Timeout applied to each collector call
    pub timeout: Duration,
    /// Root directory for written reports
    pub output_root: PathBuf,
    /// Credential resolution mode
    pub auth: AuthConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            env: DEFAULT_ENV_LABEL.to_string(),
            regions: Vec::new(),
            collectors: vec![CollectorKind::Certificates, CollectorKind::Deployments],
            deployments_namespace: DEFAULT_DEPLOYMENTS_NAMESPACE.to_string(),
            event_window_hours: DEFAULT_EVENT_WINDOW_HOURS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            output_root: default_output_root(),
            auth: AuthConfig::default(),
        }
    }
}
