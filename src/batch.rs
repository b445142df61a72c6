//! # Batch Processing
//!
//! Runs every report image in a directory through OCR and extraction, writing
//! one JSON envelope per image. Documents are independent: a failure is
//! recorded in that document's envelope and the batch carries on.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::BatchConfig;
use crate::errors::{error_logging, AppError, AppResult};
use crate::extraction::{LabTestExtractor, LabTestResponse};
use crate::instance_manager::OcrInstanceManager;
use crate::observability;
use crate::ocr::{self, OcrConfig, OcrError};

/// Boxed future returned by [`TextSource::extract_text`]
pub type TextFuture<'a> = Pin<Box<dyn Future<Output = Result<String, OcrError>> + Send + 'a>>;

/// Anything that can turn an image file into text
pub trait TextSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    fn extract_text<'a>(&'a self, image_path: &'a Path) -> TextFuture<'a>;
}

/// Tesseract-backed source with instance reuse and a shared circuit breaker
pub struct TesseractTextSource {
    config: OcrConfig,
    instances: Arc<OcrInstanceManager>,
    circuit_breaker: CircuitBreaker,
}

impl TesseractTextSource {
    pub fn new(config: OcrConfig) -> Self {
        let circuit_breaker = CircuitBreaker::new(config.recovery.clone());
        Self {
            config,
            instances: Arc::new(OcrInstanceManager::new()),
            circuit_breaker,
        }
    }
}

impl TextSource for TesseractTextSource {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn extract_text<'a>(&'a self, image_path: &'a Path) -> TextFuture<'a> {
        Box::pin(ocr::extract_text_from_image(
            image_path,
            &self.config,
            &self.instances,
            &self.circuit_breaker,
        ))
    }
}

/// What happened to one image
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    pub image: PathBuf,
    /// `None` when the envelope could not be written
    pub output: Option<PathBuf>,
    pub success: bool,
    pub records: usize,
    pub out_of_range: usize,
    pub error: Option<String>,
}

/// Totals for a finished batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub documents: Vec<DocumentOutcome>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.documents.len()
    }

    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.success).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn records(&self) -> usize {
        self.documents.iter().map(|d| d.records).sum()
    }

    pub fn out_of_range(&self) -> usize {
        self.documents.iter().map(|d| d.out_of_range).sum()
    }
}

/// Image files directly inside `config.input_dir` with an accepted extension, sorted by path
pub fn collect_images(config: &BatchConfig) -> AppResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(&config.input_dir).map_err(|e| {
        AppError::FileSystem(format!(
            "cannot read input directory {}: {}",
            config.input_dir.display(),
            e
        ))
    })?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let accepted = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| config.accepts_extension(e));
        if accepted {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// `<output_dir>/<image stem>.json`
pub fn output_path_for(output_dir: &Path, image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output_dir.join(format!("{stem}.json"))
}

/// Serialize with 4-space indentation and a trailing newline
pub fn render_response(response: &LabTestResponse) -> AppResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    response.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Write one envelope to disk
pub async fn write_response(path: &Path, response: &LabTestResponse) -> AppResult<()> {
    let data = render_response(response)?;
    tokio::fs::write(path, data).await.map_err(|e| {
        AppError::FileSystem(format!("cannot write {}: {}", path.display(), e))
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn finish_document(
    image: &Path,
    output_dir: &Path,
    response: LabTestResponse,
    started: Instant,
) -> DocumentOutcome {
    let output = output_path_for(output_dir, image);
    let records = response.data.len();
    let out_of_range = response
        .data
        .iter()
        .filter(|r| r.lab_test_out_of_range)
        .count();
    let mut success = response.is_success;
    let mut error = (!response.is_success).then(|| response.message.clone());

    let written = match write_response(&output, &response).await {
        Ok(()) => {
            info!(
                "Processed: {} -> {}",
                file_label(image),
                file_label(&output)
            );
            Some(output)
        }
        Err(e) => {
            let path_text = output.display().to_string();
            error_logging::log_filesystem_error(&e, "write_response", Some(&path_text));
            success = false;
            error = Some(e.to_string());
            None
        }
    };

    observability::record_document_metrics(success, started.elapsed());

    DocumentOutcome {
        image: image.to_path_buf(),
        output: written,
        success,
        records,
        out_of_range,
        error,
    }
}

/// OCR, extract and write one document
pub async fn process_document(
    image: &Path,
    source: &dyn TextSource,
    extractor: &LabTestExtractor,
    output_dir: &Path,
) -> DocumentOutcome {
    let started = Instant::now();

    let response = match source.extract_text(image).await {
        Ok(text) => {
            let report = extractor.extract_report(&text);
            observability::record_extraction_metrics(&report);
            info!(
                document = %file_label(image),
                records = report.records.len(),
                skipped = report.skipped.len(),
                line_errors = report.line_errors,
                "Extracted lab tests"
            );
            LabTestResponse::success(report.records)
        }
        Err(e) => {
            error_logging::log_document_error(&e, "extract_text", &image.display().to_string());
            LabTestResponse::failure(&e)
        }
    };

    finish_document(image, output_dir, response, started).await
}

/// Process every image in the input directory with at most `max_workers` in flight.
///
/// Fails only when the input directory cannot be listed or the output directory
/// cannot be created; document-level problems end up in the summary.
pub async fn run_batch(
    config: &BatchConfig,
    source: Arc<dyn TextSource>,
    extractor: Arc<LabTestExtractor>,
) -> AppResult<BatchSummary> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| {
            AppError::FileSystem(format!(
                "cannot create output directory {}: {}",
                config.output_dir.display(),
                e
            ))
        })?;

    let images = collect_images(config)?;
    if images.is_empty() {
        warn!(input_dir = %config.input_dir.display(), "No report images found");
        return Ok(BatchSummary::default());
    }

    info!(
        documents = images.len(),
        max_workers = config.max_workers,
        source = source.name(),
        "Starting batch"
    );

    let permits = Arc::new(Semaphore::new(config.max_workers));
    let output_dir = Arc::new(config.output_dir.clone());
    let mut tasks = JoinSet::new();

    for image in images {
        let permits = Arc::clone(&permits);
        let source = Arc::clone(&source);
        let extractor = Arc::clone(&extractor);
        let output_dir = Arc::clone(&output_dir);

        tasks.spawn(async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            let span = observability::document_span(&file_label(&image));

            let worker = {
                let image = image.clone();
                let output_dir = Arc::clone(&output_dir);
                tokio::spawn(
                    async move {
                        process_document(&image, source.as_ref(), &extractor, &output_dir).await
                    }
                    .instrument(span),
                )
            };

            match worker.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let message = format!("worker terminated unexpectedly: {}", join_error);
                    error_logging::log_document_error(
                        &message,
                        "process_document",
                        &image.display().to_string(),
                    );
                    finish_document(
                        &image,
                        &output_dir,
                        LabTestResponse::failure(&message),
                        Instant::now(),
                    )
                    .await
                }
            }
        });
    }

    let mut documents = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => documents.push(outcome),
            Err(e) => warn!(error = %e, "Batch task failed to join"),
        }
    }
    documents.sort_by(|a, b| a.image.cmp(&b.image));

    let summary = BatchSummary { documents };
    info!(
        total = summary.total(),
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        records = summary.records(),
        out_of_range = summary.out_of_range(),
        "Batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_uses_stem() {
        let path = output_path_for(Path::new("/out"), Path::new("/in/report.scan.png"));
        assert_eq!(path, PathBuf::from("/out/report.scan.json"));
    }

    #[test]
    fn test_render_response_indents_four_spaces() {
        let rendered = render_response(&LabTestResponse::success(Vec::new())).unwrap();
        let text = String::from_utf8(rendered).unwrap();
        assert_eq!(
            text,
            "{\n    \"is_success\": true,\n    \"message\": \"Lab tests extracted successfully.\",\n    \"data\": []\n}\n"
        );
    }

    #[test]
    fn test_summary_totals() {
        let doc = |success: bool, records: usize, out_of_range: usize| DocumentOutcome {
            image: PathBuf::from("a.png"),
            output: None,
            success,
            records,
            out_of_range,
            error: None,
        };
        let summary = BatchSummary {
            documents: vec![doc(true, 3, 1), doc(false, 0, 0), doc(true, 2, 2)],
        };
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.records(), 5);
        assert_eq!(summary.out_of_range(), 3);
    }
}
