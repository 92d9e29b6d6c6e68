//! Analysis run with explicit stages.
//!
//! 1. **Configure**: load the TOML configuration and apply command-line
//!    overrides
//! 2. **Ingest**: read the stability table into records
//! 3. **Analyse**: run the per-product, per-assay workflow
//! 4. **Output**: write the JSON report and the band CSV

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use shelf_core::{AnalysisContext, StudyAnalysis, analyze_study};
use shelf_ingest::{
    AnalysisConfig, assay_columns, load_analysis_config, load_stability_records,
    read_stability_table, records_from_frame,
};
use shelf_model::{AnalysisOptions, BoundKind, SpecLimit, StabilityRecord};
use shelf_report::{AnalysisReport, write_band_csv, write_json_report};
use tracing::{info, info_span};

// ============================================================================
// Stage 1: Configure
// ============================================================================

/// Option values given on the command line; each one replaces the
/// configured value when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionOverrides {
    pub significance: Option<f64>,
    pub confidence: Option<f64>,
    pub horizon_factor: Option<f64>,
    pub bound: Option<BoundKind>,
    pub curve_points: Option<usize>,
}

impl OptionOverrides {
    pub fn apply(&self, options: AnalysisOptions) -> AnalysisOptions {
        let mut options = options;
        if let Some(value) = self.significance {
            options = options.with_significance(value);
        }
        if let Some(value) = self.confidence {
            options = options.with_confidence(value);
        }
        if let Some(value) = self.horizon_factor {
            options = options.with_horizon_factor(value);
        }
        if let Some(value) = self.bound {
            options = options.with_bound(value);
        }
        if let Some(value) = self.curve_points {
            options = options.with_curve_points(value);
        }
        options
    }
}

/// Loads `path`, or falls back to the built-in stability limits.
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => load_analysis_config(path)
            .with_context(|| format!("load configuration {}", path.display())),
        None => {
            info!("No configuration given; using built-in stability limits");
            Ok(AnalysisConfig::stability_defaults())
        }
    }
}

// ============================================================================
// Stage 2-4: Analyse and write outputs
// ============================================================================

/// Everything one `analyze` invocation needs.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub data: PathBuf,
    pub config: Option<PathBuf>,
    /// Replaces the configured time column.
    pub time_column: Option<String>,
    /// Restricts the analysis to these configured assays.
    pub assays: Vec<String>,
    pub product: Option<String>,
    pub lots: Vec<String>,
    pub overrides: OptionOverrides,
    pub json: Option<PathBuf>,
    pub bands: Option<PathBuf>,
    pub sequential: bool,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct AnalysisRun {
    pub source: PathBuf,
    pub time_column: String,
    pub options: AnalysisOptions,
    pub record_count: usize,
    pub analysis: StudyAnalysis,
    pub json: Option<PathBuf>,
    pub bands: Option<PathBuf>,
    pub band_rows: usize,
}

impl AnalysisRun {
    /// True when at least one assay could not be analysed.
    pub fn has_failures(&self) -> bool {
        self.analysis.failure_count() > 0
    }
}

/// Runs every stage for `request`.
pub fn run_analysis(request: &AnalysisRequest) -> Result<AnalysisRun> {
    let start = Instant::now();
    let span = info_span!("analyze", data = %request.data.display());
    let _guard = span.enter();

    let config = load_config(request.config.as_deref())?;
    let options = request.overrides.apply(*config.options());
    options.validate().context("invalid analysis options")?;
    let time_column = request
        .time_column
        .clone()
        .unwrap_or_else(|| config.time_column().to_string());

    let mut context = AnalysisContext::new(config.spec_limits.clone())
        .with_options(options)
        .with_parallel(!request.sequential);
    if !request.assays.is_empty() {
        context = context.with_assays(request.assays.clone());
    }
    if let Some(product) = &request.product {
        context = context.with_product(product.clone());
    }
    if !request.lots.is_empty() {
        context = context.with_lots(request.lots.iter().cloned());
    }
    context.validate().context("invalid analysis selection")?;

    let assays = context.assay_order();
    let records = info_span!("ingest").in_scope(|| {
        load_stability_records(&request.data, &time_column, Some(assays.as_slice()))
            .with_context(|| format!("read stability table {}", request.data.display()))
    })?;
    let record_count = records.len();

    let analysis = info_span!("workflow").in_scope(|| {
        analyze_study(records, &context).context("analyse stability data")
    })?;

    let mut band_rows = 0usize;
    if let Some(path) = &request.json {
        let report = AnalysisReport::new(analysis.clone(), time_column.clone(), options)
            .with_source(&request.data);
        write_json_report(path, &report)?;
    }
    if let Some(path) = &request.bands {
        band_rows = write_band_csv(path, &analysis)?;
    }

    info!(
        records = record_count,
        failures = analysis.failure_count(),
        duration_ms = start.elapsed().as_millis(),
        "Analysis finished"
    );

    Ok(AnalysisRun {
        source: request.data.clone(),
        time_column,
        options,
        record_count,
        analysis,
        json: request.json.clone(),
        bands: request.bands.clone(),
        band_rows,
    })
}

// ============================================================================
// Assay listing
// ============================================================================

/// One measurement column of a stability table.
#[derive(Debug, Clone, PartialEq)]
pub struct AssayColumn {
    pub name: String,
    pub observations: usize,
    pub lots: usize,
    pub spec_limit: Option<SpecLimit>,
}

/// Lists the measurement columns of `data` with their coverage and the
/// configured limit, if any.
pub fn list_assays(data: &Path, config: &AnalysisConfig, time_column: &str) -> Result<Vec<AssayColumn>> {
    let df = read_stability_table(data)
        .with_context(|| format!("read stability table {}", data.display()))?;
    let names = assay_columns(&df, time_column);
    let records = records_from_frame(&df, time_column, Some(names.as_slice()))
        .with_context(|| format!("convert rows of {}", data.display()))?;
    Ok(names
        .into_iter()
        .map(|name| {
            let (observations, lots) = coverage(&records, &name);
            let spec_limit = config.spec_limit(&name).copied();
            AssayColumn {
                name,
                observations,
                lots,
                spec_limit,
            }
        })
        .collect())
}

fn coverage(records: &[StabilityRecord], assay: &str) -> (usize, usize) {
    let mut per_lot: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for record in records {
        if record.value(assay).is_some() {
            *per_lot
                .entry((record.product_id.as_str(), record.lot_id.as_str()))
                .or_default() += 1;
        }
    }
    (per_lot.values().sum(), per_lot.len())
}
