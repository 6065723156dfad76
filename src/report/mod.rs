//! JSON run-report writer.
//!
//! Serializes a completed swarm run (coverage, per-worker outcomes,
//! findings grouped by severity) to `reports/<run_id>.json` under the
//! state root. HTML rendering is a presentation concern that lives
//! outside this crate.

use crate::config::StatePaths;
use crate::finding::Severity;
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::time::now_rfc3339;
use crate::swarm::SwarmReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create report directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode run report: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write run report {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize)]
struct RunReportDocument<'a> {
    generated_at: String,
    severity_counts: BTreeMap<&'static str, usize>,
    #[serde(flatten)]
    report: &'a SwarmReport,
}

pub fn write_run_report(paths: &StatePaths, report: &SwarmReport) -> Result<PathBuf, ReportError> {
    let dir = paths.reports_dir();
    fs::create_dir_all(&dir).map_err(|source| ReportError::CreateDir {
        path: dir.display().to_string(),
        source,
    })?;

    let mut severity_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ] {
        let count = report
            .findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .count();
        severity_counts.insert(severity.as_str(), count);
    }

    let document = RunReportDocument {
        generated_at: now_rfc3339(),
        severity_counts,
        report,
    };
    let encoded =
        serde_json::to_vec_pretty(&document).map_err(|source| ReportError::Encode { source })?;

    let path = paths.run_report_path(&report.run_id);
    atomic_write_file(&path, &encoded).map_err(|source| ReportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}
