use anyhow::{Context, Result};
use tracing::{info, info_span};

use shelf_cli::pipeline::{
    AnalysisRequest, AnalysisRun, AssayColumn, OptionOverrides, list_assays, load_config,
    run_analysis,
};
use shelf_ingest::{AnalysisConfig, generate_mock_study, write_stability_csv};

use crate::cli::{AnalyzeArgs, AssaysArgs, MockArgs};

pub fn run_analyze(args: &AnalyzeArgs) -> Result<AnalysisRun> {
    let request = AnalysisRequest {
        data: args.data.clone(),
        config: args.config.clone(),
        time_column: args.time_column.clone(),
        assays: args.assays.clone(),
        product: args.product.clone(),
        lots: args.lots.clone(),
        overrides: OptionOverrides {
            significance: args.significance,
            confidence: args.confidence,
            horizon_factor: args.horizon_factor,
            bound: args.bound.map(Into::into),
            curve_points: args.curve_points,
        },
        json: args.json.clone(),
        bands: args.bands.clone(),
        sequential: args.sequential,
    };
    run_analysis(&request)
}

pub fn run_assays(args: &AssaysArgs) -> Result<Vec<AssayColumn>> {
    let config = load_config(args.config.as_deref())?;
    let time_column = args
        .time_column
        .clone()
        .unwrap_or_else(|| config.time_column().to_string());
    list_assays(&args.data, &config, &time_column)
}

pub fn run_mock(args: &MockArgs) -> Result<usize> {
    let span = info_span!("mock", seed = args.seed);
    let _guard = span.enter();

    let records = generate_mock_study(args.seed);
    write_stability_csv(&args.output, &records, &args.time_column)
        .with_context(|| format!("write {}", args.output.display()))?;
    info!(path = %args.output.display(), records = records.len(), "Wrote synthetic study");

    if let Some(path) = &args.config_out {
        let mut config = AnalysisConfig::stability_defaults();
        config.analysis.time_column = args.time_column.clone();
        let text = config
            .to_toml_string()
            .context("serialise analysis configuration")?;
        std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), "Wrote analysis configuration");
    }
    Ok(records.len())
}
