//! CLI module for eksaudit
//!
//! Subcommands:
//! - `eksaudit scan` - Collect signals from every cluster and write region reports
//! - `eksaudit clusters` - List the EKS clusters a scan would visit
//! - `eksaudit regions` - List the regions a scan would cover

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::collect::CollectorKind;
use crate::config::{
    DEFAULT_DEPLOYMENTS_NAMESPACE, DEFAULT_ENV_LABEL, DEFAULT_EVENT_WINDOW_HOURS,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_SECS,
};

mod commands;
mod display;

pub use commands::*;
pub use display::*;

#[derive(Parser, Debug)]
#[command(name = "eksaudit")]
#[command(about = "Inventory EKS clusters across regions and report certificate and workload signals")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Named AWS profile for dev mode (overrides AWS_PROFILE)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Resolve credentials from the named profile instead of the ambient chain
    #[arg(long, global = true)]
    pub dev: bool,

    /// Path to a .env file loaded before credential resolution
    #[arg(long, value_name = "FILE", global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan clusters region by region and write one report per region
    Scan(ScanArgs),

    /// List the EKS clusters a scan would visit
    Clusters(ClustersArgs),

    /// List the regions a scan would cover
    Regions,
}

/// Arguments for the scan command
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Environment label stamped on records and used in the output path
    #[arg(long, default_value = DEFAULT_ENV_LABEL)]
    pub env: String,

    /// Region to scan (repeatable; omit to discover all enabled regions)
    #[arg(short, long = "region", value_name = "REGION")]
    pub regions: Vec<String>,

    /// Collectors to run against each cluster
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [CollectorKind::Certificates, CollectorKind::Deployments]
    )]
    pub collectors: Vec<CollectorKind>,

    /// Namespace the deployment collector reads
    #[arg(long, default_value = DEFAULT_DEPLOYMENTS_NAMESPACE)]
    pub deployments_namespace: String,

    /// Recency window for the event collector, in hours
    #[arg(long, default_value_t = DEFAULT_EVENT_WINDOW_HOURS)]
    pub event_window_hours: i64,

    /// Maximum clusters collected concurrently per region
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Timeout for each collector call, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Root directory for report files (default: ~/.eksaudit)
    #[arg(long, value_name = "DIR")]
    pub output_root: Option<String>,
}

/// Arguments for the clusters command
#[derive(Parser, Debug)]
pub struct ClustersArgs {
    /// Region to list (repeatable; omit to discover all enabled regions)
    #[arg(short, long = "region", value_name = "REGION")]
    pub regions: Vec<String>,
}
