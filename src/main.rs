use quantsweep::config::AppConfig;
use quantsweep::error::{Result, SweepError};
use quantsweep::sim::{SimEvaluator, SimTrainer};
use quantsweep::sweep::{ComparisonView, SweepRunner};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config: {}", e);
        }
        return Err(SweepError::Validation(errors.join("; ")));
    }

    let runner =
        SweepRunner::new(SimTrainer::new(), SimEvaluator).with_settings(config.run.settings());
    let environments = config.environment_pairs();
    let results = runner.run_comprehensive(
        &config.sweep.algorithms(),
        &environments,
        config.sweep.presets.as_deref(),
        &config.custom_config_map(),
    )?;

    let view = ComparisonView::full_matrix(&results);
    info!(
        rows = view.rows.len(),
        errors = view.error_count(),
        "Sweep summary ready"
    );
    if let Some(best) = view.best_by_test_return() {
        info!(path = ?best.path, "Best test-data return");
    }

    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter_directive()));

    // stdout carries the JSON summary
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
