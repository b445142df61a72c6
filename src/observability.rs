//! Observability module for logging, spans and metrics.
//!
//! - Structured logging through `tracing-subscriber` (pretty or JSON)
//! - Spans for OCR calls and per-document extraction
//! - `metrics` counters and histograms, optionally rendered to a Prometheus
//!   text file at the end of a batch

use std::time::Duration;

use anyhow::Result;
use leptess::LepTess;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::prelude::*;

use crate::extraction::ExtractionReport;
use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Handles kept alive for the lifetime of the process
pub struct ObservabilityHandle {
    metrics: Option<PrometheusHandle>,
    snapshot_path: Option<String>,
}

impl ObservabilityHandle {
    /// Render collected metrics to the configured snapshot file, if any
    pub fn write_metrics_snapshot(&self) -> Result<()> {
        if let (Some(handle), Some(path)) = (&self.metrics, &self.snapshot_path) {
            std::fs::write(path, handle.render())?;
            tracing::info!(path = %path, "Metrics snapshot written");
        }
        Ok(())
    }
}

/// Initialize tracing and, when a snapshot path is configured, the metrics recorder
pub fn init_observability_with_config(config: &ObservabilityConfig) -> Result<ObservabilityHandle> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;

    let metrics = if config.metrics_enabled() {
        Some(init_metrics()?)
    } else {
        None
    };

    tracing::info!(
        environment = %config.environment,
        metrics_snapshot = ?config.metrics_snapshot_path,
        "Observability initialized"
    );

    Ok(ObservabilityHandle {
        metrics,
        snapshot_path: config.metrics_snapshot_path.clone(),
    })
}

fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
        .add_directive(format!("lab_report_extractor={}", config.log_level).parse()?);

    match config.effective_log_format() {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?,
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Metrics collection initialized");
    Ok(handle)
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str, image: &str) -> tracing::Span {
    tracing::info_span!(
        "ocr_operation",
        operation = operation,
        image = image,
        component = "ocr"
    )
}

/// Create a span covering one document (OCR, extraction and output)
pub fn document_span(document: &str) -> tracing::Span {
    tracing::info_span!("document", document = document, component = "batch")
}

/// Parameters for [`record_ocr_performance_metrics`]
#[derive(Debug, Clone, Copy)]
pub struct OcrPerformanceMetricsParams {
    pub success: bool,
    pub total_duration: Duration,
    pub ocr_duration: Duration,
    pub image_size: u64,
    pub attempt_count: u32,
}

/// Record OCR operation metrics
pub fn record_ocr_performance_metrics(params: OcrPerformanceMetricsParams) {
    let result = if params.success { "success" } else { "failure" };
    metrics::counter!("ocr_operations_total", "result" => result).increment(1);
    metrics::histogram!("ocr_duration_seconds").record(params.total_duration.as_secs_f64());
    metrics::histogram!("ocr_engine_duration_seconds").record(params.ocr_duration.as_secs_f64());
    metrics::histogram!("ocr_image_size_bytes").record(params.image_size as f64);
    metrics::histogram!("ocr_attempts").record(f64::from(params.attempt_count));
}

/// Update circuit breaker state metric
pub fn update_circuit_breaker_state(is_open: bool) {
    metrics::gauge!("circuit_breaker_state").set(if is_open { 1.0 } else { 0.0 });
}

/// Record the line tally of one extracted document
pub fn record_extraction_metrics(report: &ExtractionReport) {
    metrics::counter!("lab_extraction_lines_total", "outcome" => "record")
        .increment(report.records.len() as u64);
    for (reason, count) in report.skipped_by_reason() {
        metrics::counter!("lab_extraction_lines_total", "outcome" => reason).increment(count);
    }
    metrics::counter!("lab_extraction_lines_total", "outcome" => "error")
        .increment(report.line_errors as u64);

    let out_of_range = report
        .records
        .iter()
        .filter(|r| r.lab_test_out_of_range)
        .count();
    metrics::counter!("lab_extraction_records_total", "flag" => "out_of_range")
        .increment(out_of_range as u64);
    metrics::counter!("lab_extraction_records_total", "flag" => "in_range")
        .increment((report.records.len() - out_of_range) as u64);
}

/// Record the final status of one document
pub fn record_document_metrics(success: bool, duration: Duration) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("lab_documents_total", "result" => result).increment(1);
    metrics::histogram!("lab_document_duration_seconds").record(duration.as_secs_f64());
}

/// Check that Tesseract can be initialized with the given language data
pub fn check_ocr_health(languages: &str, tessdata_path: Option<&str>) -> Result<()> {
    match LepTess::new(tessdata_path, languages) {
        Ok(_) => {
            tracing::debug!(languages = %languages, "OCR health check passed");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("OCR health check failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_without_recorder_is_noop() {
        let handle = ObservabilityHandle {
            metrics: None,
            snapshot_path: Some("/nonexistent/dir/metrics.prom".to_string()),
        };
        assert!(handle.write_metrics_snapshot().is_ok());
    }

    #[test]
    fn test_metric_helpers_without_recorder() {
        // metrics macros are no-ops until a recorder is installed
        record_document_metrics(true, Duration::from_millis(5));
        update_circuit_breaker_state(false);
        record_ocr_performance_metrics(OcrPerformanceMetricsParams {
            success: false,
            total_duration: Duration::from_millis(10),
            ocr_duration: Duration::ZERO,
            image_size: 1024,
            attempt_count: 3,
        });
    }
}
