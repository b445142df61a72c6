//! # Lab Report Extractor
//!
//! Batch tool that runs scanned lab report images through Tesseract OCR and
//! turns each report into structured lab test records (name, value, unit,
//! reference range, out-of-range flag) written as one JSON file per image.

pub mod batch;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod instance_manager;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;

// Re-export types for easier access
pub use batch::{run_batch, BatchSummary, DocumentOutcome, TesseractTextSource, TextSource};
pub use config::{AppConfig, BatchConfig};
pub use errors::{AppError, AppResult};
pub use extraction::{LabTestExtractor, LabTestRecord, LabTestResponse, LabVocabulary};
