//! Display formatting for CLI output
//!
//! Pure functions that turn command results into printable text

use std::collections::BTreeMap;

use super::commands::ScanOutcome;
use crate::scheduler::CollectionError;

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Format a simple aligned table with uppercase headers
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found.\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();
    let header_row: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
    push_row(&mut output, &header_row, &widths);
    for row in rows {
        push_row(&mut output, &row, &widths);
    }
    output
}

fn push_row(output: &mut String, cells: &[String], widths: &[usize]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            output.push_str("   ");
        }
        match widths.get(i) {
            Some(width) => output.push_str(&format!("{cell:width$}")),
            None => output.push_str(cell),
        }
    }
    output.push('\n');
}

// ============================================================================
// Scan display
// ============================================================================

/// Format the per-region result table of a finished scan
pub fn format_scan_summary(outcome: &ScanOutcome) -> String {
    let headers = &["REGION", "CLUSTERS", "ERRORS", "REPORT"];
    let written: Vec<&str> = outcome
        .written
        .iter()
        .filter_map(|p| p.to_str())
        .collect();

    let mut rows: Vec<Vec<String>> = outcome
        .reports
        .iter()
        .map(|(region, report)| {
            let errors = outcome
                .collection_errors
                .iter()
                .filter(|e| e.region == *region)
                .count();
            let report_cell = written
                .iter()
                .find(|p| p.contains(&format!("/{region}/")))
                .map(|p| p.to_string())
                .unwrap_or_else(|| "WRITE FAILED".to_string());
            vec![
                region.clone(),
                report.len().to_string(),
                errors.to_string(),
                report_cell,
            ]
        })
        .collect();

    for failure in &outcome.region_failures {
        rows.push(vec![
            failure.region.clone(),
            "-".to_string(),
            "-".to_string(),
            format!("SKIPPED: {}", failure.message),
        ]);
    }

    let mut output = format_table(headers, rows);
    if !outcome.collection_errors.is_empty() {
        output.push('\n');
        output.push_str(&format_collection_errors(&outcome.collection_errors));
    }
    output
}

/// Format contained failures, one line each
pub fn format_collection_errors(errors: &[CollectionError]) -> String {
    let mut output = String::from("Failures:\n");
    for error in errors {
        output.push_str(&format!("  - {error}\n"));
    }
    output
}

// ============================================================================
// Cluster and region display
// ============================================================================

/// Format the region-to-clusters listing
pub fn format_cluster_list(by_region: &BTreeMap<String, Vec<String>>) -> String {
    let headers = &["REGION", "CLUSTER"];
    let rows: Vec<Vec<String>> = by_region
        .iter()
        .flat_map(|(region, clusters)| {
            clusters
                .iter()
                .map(|cluster| vec![region.clone(), cluster.clone()])
                .collect::<Vec<_>>()
        })
        .collect();

    format_table(headers, rows)
}

/// Format the plain region listing
pub fn format_region_list(regions: &[String]) -> String {
    let headers = &["REGION"];
    let rows: Vec<Vec<String>> = regions.iter().map(|r| vec![r.clone()]).collect();

    format_table(headers, rows)
}
