//! eksaudit: inventory EKS clusters across regions and report certificate
//! and workload signals as per-region JSON documents.
//!
//! The pipeline runs discovery, a per-cluster worker, a region scheduler
//! and a report writer in sequence, with every seam behind a trait so each
//! stage can be exercised in isolation.

pub mod cli;
pub mod client;
pub mod collect;
pub mod config;
pub mod discovery;
pub mod report;
pub mod scheduler;
