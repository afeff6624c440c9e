pub mod models;
pub mod processor;
pub mod storage;

use common::Result;
use common::config::Settings;
use processor::{EtlProcessor, EtlSummary};

/// Runs the complete ETL pipeline from a config file path.
pub async fn run_pipeline(config_path: &str) -> Result<EtlSummary> {
    let settings = Settings::new(config_path)?;
    run_with_settings(&settings).await
}

/// Runs the pipeline with already-loaded settings. Used by the CLI and by
/// the integration tests, which build `Settings` directly.
pub async fn run_with_settings(settings: &Settings) -> Result<EtlSummary> {
    let processor = EtlProcessor::new(settings)?;
    processor.run().await
}
