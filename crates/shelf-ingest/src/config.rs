//! TOML analysis configuration.
//!
//! ```toml
//! [analysis]
//! time_column = "timepoint_months"
//! significance = 0.05
//! confidence = 0.95
//!
//! [spec_limits.purity]
//! value = 98.0
//! direction = "lower"
//! ```
//!
//! The `spec_limits` table decides which assays are analysed.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shelf_model::{AnalysisOptions, SpecLimit};
use tracing::{info, warn};

use crate::error::{IngestError, Result};
use crate::table::DEFAULT_TIME_COLUMN;

/// `[analysis]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    pub time_column: String,
    #[serde(flatten)]
    pub options: AnalysisOptions,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            options: AnalysisOptions::default(),
        }
    }
}

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub analysis: AnalysisSection,
    pub spec_limits: BTreeMap<String, SpecLimit>,
}

impl AnalysisConfig {
    /// Limits of the stability programme the synthetic study is built for:
    /// purity must stay at or above 98.0 and the main impurity at or below
    /// 0.75.
    pub fn stability_defaults() -> Self {
        let mut spec_limits = BTreeMap::new();
        spec_limits.insert("purity".to_string(), SpecLimit::lower(98.0));
        spec_limits.insert("main_impurity".to_string(), SpecLimit::upper(0.75));
        Self {
            analysis: AnalysisSection::default(),
            spec_limits,
        }
    }

    pub fn time_column(&self) -> &str {
        &self.analysis.time_column
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.analysis.options
    }

    /// Configured assays in name order.
    pub fn assays(&self) -> Vec<String> {
        self.spec_limits.keys().cloned().collect()
    }

    pub fn spec_limit(&self, assay: &str) -> Option<&SpecLimit> {
        self.spec_limits.get(assay)
    }

    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Loads and validates an analysis configuration file.
pub fn load_analysis_config(path: &Path) -> Result<AnalysisConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IngestError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    let config = parse_analysis_config(&content, path)?;
    info!(
        path = %path.display(),
        assays = config.spec_limits.len(),
        "Loaded analysis configuration"
    );
    Ok(config)
}

/// Parses configuration text; `origin` is only used in error messages.
pub fn parse_analysis_config(content: &str, origin: &Path) -> Result<AnalysisConfig> {
    let config: AnalysisConfig =
        toml::from_str(content).map_err(|source| IngestError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;

    let invalid = |source| IngestError::InvalidConfig {
        path: origin.to_path_buf(),
        source,
    };
    config.analysis.options.validate().map_err(invalid)?;
    for (assay, limit) in &config.spec_limits {
        limit.validate(assay).map_err(invalid)?;
    }
    if config.spec_limits.is_empty() {
        warn!(path = %origin.display(), "Configuration defines no spec limits; nothing to analyse");
    }
    Ok(config)
}
