use anyhow::Result;
use lab_report_extractor::batch::{self, TesseractTextSource, TextSource};
use lab_report_extractor::config::AppConfig;
use lab_report_extractor::errors::error_logging;
use lab_report_extractor::extraction::LabTestExtractor;
use lab_report_extractor::observability;
use std::sync::Arc;
use tracing::{info, warn};

/// Load and validate configuration before anything else starts
fn load_configuration() -> Result<AppConfig> {
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to read configuration: {}", e))?;

    config.validate().map_err(|e| {
        anyhow::anyhow!(
            "Configuration validation failed: {}. Please check your environment variables.",
            e
        )
    })?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = load_configuration()?;

    let observability_handle = observability::init_observability_with_config(&config.observability)?;
    info!("{}", config.summary());

    // Language data must be present before any document is queued
    observability::check_ocr_health(&config.ocr.languages, config.ocr.tessdata_path.as_deref())
        .inspect_err(|e| error_logging::log_config_error(e, "OCR_LANGUAGES", "ocr_health_check"))?;
    info!(languages = %config.ocr.languages, "OCR engine ready");

    let extractor = Arc::new(LabTestExtractor::with_vocabulary(config.vocabulary.clone())?);
    if !extractor.noise_filter_enabled() {
        warn!("Noise keyword filter disabled, header and footer lines may produce records");
    }

    let source: Arc<dyn TextSource> = Arc::new(TesseractTextSource::new(config.ocr.clone()));
    let summary = batch::run_batch(&config.batch, source, extractor).await?;

    info!(
        "Done: {} documents, {} succeeded, {} failed, {} lab tests ({} out of range)",
        summary.total(),
        summary.succeeded(),
        summary.failed(),
        summary.records(),
        summary.out_of_range()
    );

    if let Err(e) = observability_handle.write_metrics_snapshot() {
        warn!(error = %e, "Failed to write metrics snapshot");
    }

    Ok(())
}
