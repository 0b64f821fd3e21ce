use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::analysis::AnalysisReport;
use crate::error::ReportError;

const HEADER_RULE: usize = 60;
const SECTION_RULE: usize = 40;

/// `report_<template>_<stem>.txt` for a source file.
pub fn default_file_name(template: &str, source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    format!("report_{template}_{stem}.txt")
}

/// Render the plain-text report.
pub fn render(report: &AnalysisReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "# {} DATA ANALYSIS REPORT", report.template().to_uppercase());
    let _ = writeln!(out, "File: {}", report.source().display());
    let _ = writeln!(
        out,
        "Generated: {}",
        report.generated_at().format("%Y-%m-%d %H:%M:%S%.6f")
    );
    let _ = writeln!(out, "{}\n", "=".repeat(HEADER_RULE));

    for (i, pair) in report.analyses().iter().enumerate() {
        let _ = writeln!(out, "## Analysis {}: {}\n", i + 1, pair.question);
        let _ = writeln!(out, "{}\n", pair.answer);
        let _ = writeln!(out, "{}\n", "-".repeat(SECTION_RULE));
    }
    out
}

/// Write the text report to `path`.
pub fn write(report: &AnalysisReport, path: &Path) -> Result<(), ReportError> {
    fs::write(path, render(report)).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Report written to {}", path.display());
    Ok(())
}

/// Write the report as pretty-printed JSON next to the text report.
pub fn write_json(report: &AnalysisReport, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("JSON report written to {}", path.display());
    Ok(())
}

/// Write the text report (and optionally JSON) into `dir` under the default
/// name. Returns the text report path.
pub fn write_to_dir(
    report: &AnalysisReport,
    dir: &Path,
    json: bool,
) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(default_file_name(report.template(), report.source()));
    write(report, &path)?;
    if json {
        write_json(report, &path.with_extension("json"))?;
    }
    Ok(path)
}
