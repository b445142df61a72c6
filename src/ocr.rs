//! # OCR Processing Module
//!
//! Turns a scanned lab report image into plain text with Tesseract.
//!
//! The engine call is wrapped with:
//! - format detection and format-specific size limits before any decoding
//! - a memory estimate checked against `OcrConfig::memory_limit_mb`
//! - a per-attempt timeout and exponential backoff with jitter between attempts
//! - the shared [`CircuitBreaker`]
//!
//! Supported formats: PNG, JPEG, BMP and TIFF.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn, Instrument};

pub use crate::circuit_breaker::CircuitBreaker;
use crate::errors::error_logging;
pub use crate::instance_manager::OcrInstanceManager;
use crate::observability;
pub use crate::ocr_config::{OcrConfig, RecoveryConfig};
pub use crate::ocr_errors::OcrError;

/// Read the file head and guess its image format
fn detect_image_format(path: &Path, config: &OcrConfig) -> Option<image::ImageFormat> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let mut buffer = vec![0; config.buffer_size];
    let bytes_read = reader.read(&mut buffer).ok()?;
    if bytes_read < config.min_format_bytes {
        debug!(
            path = %path.display(),
            bytes_read,
            "Not enough bytes for format detection"
        );
        return None;
    }
    buffer.truncate(bytes_read);
    image::guess_format(&buffer).ok()
}

/// Validate existence, size and format of an image before OCR
pub fn validate_image_with_format_limits(path: &Path, config: &OcrConfig) -> Result<(), OcrError> {
    if !path.is_file() {
        return Err(OcrError::Validation(format!(
            "not a readable file ({})",
            path.display()
        )));
    }

    let file_size = path
        .metadata()
        .map_err(|e| OcrError::Validation(format!("cannot read metadata: {}", e)))?
        .len();

    if file_size == 0 {
        return Err(OcrError::Validation(format!(
            "file is empty ({})",
            path.display()
        )));
    }
    if file_size > config.max_file_size {
        return Err(OcrError::Validation(format!(
            "file too large ({} bytes, maximum allowed: {} bytes)",
            file_size, config.max_file_size
        )));
    }

    let format = detect_image_format(path, config).ok_or_else(|| {
        OcrError::Validation(format!(
            "unrecognized image format ({})",
            path.display()
        ))
    })?;

    let format_limit = match format {
        image::ImageFormat::Png => config.format_limits.png_max,
        image::ImageFormat::Jpeg => config.format_limits.jpeg_max,
        image::ImageFormat::Bmp => config.format_limits.bmp_max,
        image::ImageFormat::Tiff => config.format_limits.tiff_max,
        other => {
            return Err(OcrError::Validation(format!(
                "unsupported image format {:?}",
                other
            )))
        }
    };

    if file_size > format_limit {
        return Err(OcrError::Validation(format!(
            "file too large for {:?} format: {} bytes (maximum allowed: {} bytes)",
            format, file_size, format_limit
        )));
    }

    let estimated_memory_mb = estimate_memory_usage(file_size, &format);
    #[allow(clippy::cast_precision_loss)]
    let limit_mb = config.memory_limit_mb as f64;
    if estimated_memory_mb > limit_mb {
        return Err(OcrError::Validation(format!(
            "estimated memory usage too high: {:.1}MB (maximum allowed: {}MB)",
            estimated_memory_mb, config.memory_limit_mb
        )));
    }

    debug!(
        path = %path.display(),
        format = ?format,
        file_size,
        estimated_memory_mb,
        "Image passed validation"
    );
    Ok(())
}

/// Estimated decode + OCR memory in MB for a file of the given size and format
///
/// | Format | Factor |
/// |--------|--------|
/// | PNG    | 3.0x   |
/// | JPEG   | 2.5x   |
/// | BMP    | 1.2x   |
/// | TIFF   | 4.0x   |
pub fn estimate_memory_usage(file_size: u64, format: &image::ImageFormat) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);

    let memory_factor = match format {
        image::ImageFormat::Png => 3.0,
        image::ImageFormat::Jpeg => 2.5,
        image::ImageFormat::Bmp => 1.2,
        image::ImageFormat::Tiff => 4.0,
        _ => 3.0,
    };

    file_size_mb * memory_factor
}

/// Whether the file is an image format Tesseract can read and that passes the limits
pub fn is_supported_image_format(path: &Path, config: &OcrConfig) -> bool {
    validate_image_with_format_limits(path, config).is_ok()
}

/// Trim every line and drop the empty ones
pub fn clean_ocr_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Extract text from a report image with validation, retries and circuit breaker protection.
///
/// Validation failures are returned immediately and do not count against the
/// circuit breaker; only exhausted engine attempts do.
///
/// # Errors
///
/// - `CircuitOpen` when the breaker is rejecting requests
/// - `Validation` for missing, empty, oversized or unsupported files
/// - `Initialization`, `ImageLoad`, `Extraction` or `Timeout` from the last attempt
pub async fn extract_text_from_image(
    image_path: &Path,
    config: &OcrConfig,
    instance_manager: &Arc<OcrInstanceManager>,
    circuit_breaker: &CircuitBreaker,
) -> Result<String, OcrError> {
    let span = observability::ocr_span("extract_text_from_image", &image_path.display().to_string());
    extract_with_recovery(image_path, config, instance_manager, circuit_breaker)
        .instrument(span)
        .await
}

async fn extract_with_recovery(
    image_path: &Path,
    config: &OcrConfig,
    instance_manager: &Arc<OcrInstanceManager>,
    circuit_breaker: &CircuitBreaker,
) -> Result<String, OcrError> {
    let start_time = Instant::now();

    validate_image_with_format_limits(image_path, config)?;

    // Checked after validation: an admitted half-open trial must always be reported.
    if !circuit_breaker.try_acquire() {
        warn!(image = %image_path.display(), "Circuit breaker is open, rejecting OCR request");
        observability::update_circuit_breaker_state(true);
        return Err(OcrError::CircuitOpen(
            "OCR engine failed repeatedly; retry after the reset timeout".to_string(),
        ));
    }

    let image_size = image_path.metadata().map(|m| m.len()).unwrap_or(0);
    info!(image = %image_path.display(), image_size, "Starting OCR text extraction");

    let max_attempts = config.recovery.max_retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match perform_ocr_extraction(image_path, config, instance_manager).await {
            Ok((text, ocr_duration)) => {
                circuit_breaker.record_success();
                observability::update_circuit_breaker_state(false);
                observability::record_ocr_performance_metrics(
                    observability::OcrPerformanceMetricsParams {
                        success: true,
                        total_duration: start_time.elapsed(),
                        ocr_duration,
                        image_size,
                        attempt_count: attempt,
                    },
                );

                info!(
                    attempt,
                    total_ms = start_time.elapsed().as_millis() as u64,
                    characters = text.len(),
                    "OCR extraction completed"
                );
                return Ok(text);
            }
            Err(err) if attempt >= max_attempts => {
                let total_duration = start_time.elapsed();
                circuit_breaker.record_failure();
                observability::update_circuit_breaker_state(circuit_breaker.is_open());
                observability::record_ocr_performance_metrics(
                    observability::OcrPerformanceMetricsParams {
                        success: false,
                        total_duration,
                        ocr_duration: Duration::ZERO,
                        image_size,
                        attempt_count: attempt,
                    },
                );

                let path_text = image_path.display().to_string();
                error_logging::log_ocr_error(
                    &err,
                    "ocr_extraction_retry",
                    Some(&path_text),
                    Some(image_size),
                    Some(total_duration),
                );
                return Err(err);
            }
            Err(err) => {
                let delay_ms = calculate_retry_delay(attempt, &config.recovery);
                warn!(attempt, delay_ms, error = %err, "OCR extraction attempt failed, retrying");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// One engine attempt on the blocking pool, bounded by the operation timeout
async fn perform_ocr_extraction(
    image_path: &Path,
    config: &OcrConfig,
    instance_manager: &Arc<OcrInstanceManager>,
) -> Result<(String, Duration), OcrError> {
    let ocr_start_time = Instant::now();
    let timeout_duration = Duration::from_secs(config.recovery.operation_timeout_secs);

    let path = image_path.to_path_buf();
    let engine_config = config.clone();
    let manager = Arc::clone(instance_manager);

    let task = tokio::task::spawn_blocking(move || -> Result<String, OcrError> {
        let instance = manager
            .get_instance(&engine_config)
            .map_err(|e| OcrError::Initialization(e.to_string()))?;

        let mut tess = instance.lock();
        tess.set_image(&path)
            .map_err(|e| OcrError::ImageLoad(format!("Failed to load image for OCR: {e}")))?;
        let raw = tess.get_utf8_text().map_err(|e| {
            OcrError::Extraction(format!("Failed to extract text from image: {e}"))
        })?;

        Ok(clean_ocr_text(&raw))
    });

    let ocr_duration_ms = || ocr_start_time.elapsed().as_millis() as u64;

    match tokio::time::timeout(timeout_duration, task).await {
        Ok(Ok(Ok(text))) => {
            debug!(ocr_ms = ocr_duration_ms(), characters = text.len(), "OCR engine pass finished");
            Ok((text, ocr_start_time.elapsed()))
        }
        Ok(Ok(Err(e))) => {
            warn!(ocr_ms = ocr_duration_ms(), error = %e, "OCR engine pass failed");
            Err(e)
        }
        Ok(Err(join_error)) => Err(OcrError::Extraction(format!(
            "OCR worker terminated: {}",
            join_error
        ))),
        Err(_) => {
            warn!(
                ocr_ms = ocr_duration_ms(),
                limit_secs = config.recovery.operation_timeout_secs,
                "OCR processing timed out"
            );
            Err(OcrError::Timeout(format!(
                "OCR operation timed out after {} seconds",
                config.recovery.operation_timeout_secs
            )))
        }
    }
}

/// Delay before retry number `attempt` (1-based) in milliseconds.
///
/// ```text
/// delay  = min(base * 2^(attempt-1), max)
/// result = delay + random(0 .. delay/4)
/// ```
pub fn calculate_retry_delay(attempt: u32, recovery: &RecoveryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32);
    let delay = recovery
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(recovery.max_retry_delay_ms);

    let jitter = rand::random::<u64>() % (delay / 4).max(1);
    delay + jitter
}
