use ecotrack::{Config, Indicator, Pipeline};
use std::process::ExitCode;

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!("Starting ecotrack indicator pipeline");
    log::info!("   API: {}", config.base_url);
    log::info!("   Data directory: {}", config.data_dir.display());
    log::info!(
        "   Cache expiry: {:.1} days",
        config.freshness_window.as_secs_f64() / 86_400.0
    );

    let pipeline = match Pipeline::new(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::error!("Failed to set up the pipeline: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = pipeline.run(&Indicator::defaults());

    let processed = report.processed().count();
    log::info!(
        "Finished: {} of {} indicators processed",
        processed,
        report.outcomes.len()
    );
    for (indicator, error) in report.skipped() {
        log::warn!("   {} was skipped: {}", indicator.name, error);
    }

    ExitCode::SUCCESS
}
