//! JSON analysis report.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shelf_core::StudyAnalysis;
use shelf_model::AnalysisOptions;
use tracing::info;

/// Tool name recorded in every report.
pub const GENERATOR: &str = "shelf";

/// Top-level document written by [`write_json_report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generator: String,
    pub version: String,
    pub source: Option<String>,
    pub time_column: String,
    pub options: AnalysisOptions,
    pub analysis: StudyAnalysis,
}

impl AnalysisReport {
    pub fn new(analysis: StudyAnalysis, time_column: impl Into<String>, options: AnalysisOptions) -> Self {
        Self {
            generator: GENERATOR.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            source: None,
            time_column: time_column.into(),
            options,
            analysis,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: &Path) -> Self {
        self.source = Some(source.display().to_string());
        self
    }
}

/// Writes `report` as pretty-printed JSON.
pub fn write_json_report(path: &Path, report: &AnalysisReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("serialise report to {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    info!(path = %path.display(), "Wrote JSON report");
    Ok(())
}
