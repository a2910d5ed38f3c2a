//! Report persistence
//!
//! Writes one JSON document per region under the output root:
//! `{root}/{env}/{region}/clusters.json`. Parent directories are created on
//! demand and an existing report is replaced wholesale, so reruns converge
//! on the latest scan.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::scheduler::RegionReport;

/// Report file name within each region directory
pub const REPORT_FILE_NAME: &str = "clusters.json";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Write failed: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes region reports as pretty-printed JSON under a fixed layout
pub struct ReportWriter {
    root: PathBuf,
}

impl ReportWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Target path for a region's report
    pub fn region_path(&self, env: &str, region: &str) -> PathBuf {
        self.root.join(env).join(region).join(REPORT_FILE_NAME)
    }

    /// Serialize and persist one region's report, replacing any previous file
    pub fn write(
        &self,
        env: &str,
        region: &str,
        report: &RegionReport,
    ) -> Result<PathBuf, ReportError> {
        let path = self.region_path(env, region);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(report)?;
        fs::write(&path, body)?;
        info!(
            "Wrote {} cluster records to {}",
            report.len(),
            path.display()
        );
        Ok(path)
    }
}
