//! # Unified Application Configuration
//!
//! All runtime settings in one structure, loaded from environment variables and
//! validated before any document is touched.

use std::env;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};
use crate::extraction::vocabulary::{load_lab_vocabulary_from, LabVocabulary};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::{OcrConfig, PageSegMode};

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "tif", "bmp"];

/// Batch ingestion settings
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory scanned (non-recursively) for report images
    pub input_dir: PathBuf,
    /// Directory receiving one `<stem>.json` per image; created if missing
    pub output_dir: PathBuf,
    /// Maximum number of documents processed at once
    pub max_workers: usize,
    /// Accepted file extensions, lower case, without the dot
    pub image_extensions: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            max_workers: 4,
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl BatchConfig {
    /// Validate batch configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(AppError::Config("INPUT_DIR cannot be empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(AppError::Config("OUTPUT_DIR cannot be empty".to_string()));
        }
        if self.max_workers == 0 {
            return Err(AppError::Config("MAX_WORKERS cannot be 0".to_string()));
        }
        if self.max_workers > 64 {
            return Err(AppError::Config(
                "MAX_WORKERS cannot be greater than 64".to_string(),
            ));
        }
        if self.image_extensions.is_empty() {
            return Err(AppError::Config(
                "IMAGE_EXTENSIONS must list at least one extension".to_string(),
            ));
        }
        if let Some(bad) = self
            .image_extensions
            .iter()
            .find(|e| e.is_empty() || e.starts_with('.') || e.chars().any(char::is_whitespace))
        {
            return Err(AppError::Config(format!(
                "Invalid image extension '{}': use bare names like 'png'",
                bad
            )));
        }
        Ok(())
    }

    /// Case-insensitive extension check
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let lowered = extension.to_lowercase();
        self.image_extensions.iter().any(|e| *e == lowered)
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub batch: BatchConfig,
    pub ocr: OcrConfig,
    pub observability: ObservabilityConfig,
    pub vocabulary: LabVocabulary,
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    expected: &str,
) -> AppResult<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be {}", key, expected))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("INPUT_DIR") {
            config.batch.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("OUTPUT_DIR") {
            config.batch.output_dir = PathBuf::from(dir);
        }
        config.batch.max_workers = parse_var(
            &lookup,
            "MAX_WORKERS",
            config.batch.max_workers,
            "a positive number",
        )?;
        if let Some(list) = lookup("IMAGE_EXTENSIONS") {
            config.batch.image_extensions = list
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
        }

        if let Some(languages) = lookup("OCR_LANGUAGES") {
            config.ocr.languages = languages.trim().to_string();
        }
        let psm_code: u8 = parse_var(&lookup, "OCR_PSM", 3, "a page segmentation mode number")?;
        config.ocr.psm_mode = PageSegMode::from_code(psm_code).ok_or_else(|| {
            AppError::Config(format!(
                "OCR_PSM {} is not supported (use 3, 4, 6 or 11)",
                psm_code
            ))
        })?;
        config.ocr.tessdata_path = lookup("TESSDATA_PATH").filter(|p| !p.trim().is_empty());
        config.ocr.user_words_file =
            lookup("OCR_USER_WORDS_FILE").filter(|p| !p.trim().is_empty());
        config.ocr.character_whitelist =
            lookup("OCR_CHARACTER_WHITELIST").filter(|w| !w.is_empty());
        config.ocr.recovery.operation_timeout_secs = parse_var(
            &lookup,
            "OCR_TIMEOUT_SECS",
            config.ocr.recovery.operation_timeout_secs,
            "a number of seconds",
        )?;
        config.ocr.recovery.max_retries = parse_var(
            &lookup,
            "OCR_MAX_RETRIES",
            config.ocr.recovery.max_retries,
            "a number",
        )?;
        config.ocr.memory_limit_mb = parse_var(
            &lookup,
            "OCR_MEMORY_LIMIT_MB",
            config.ocr.memory_limit_mb,
            "a number of megabytes",
        )?;

        config.observability = ObservabilityConfig::from_lookup(&lookup);

        config.vocabulary = load_lab_vocabulary_from(lookup("LAB_VOCABULARY_PATH").as_deref());
        let disable_noise_filter = lookup("DISABLE_NOISE_FILTER")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if disable_noise_filter {
            config.vocabulary = config.vocabulary.without_noise_keywords();
        }

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.batch.validate()?;
        self.ocr.validate()?;
        self.observability.validate()?;
        self.vocabulary.validate()?;
        Ok(())
    }

    /// One-line summary for startup logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: input_dir={}, output_dir={}, max_workers={}, extensions=[{}], ocr_languages={}, psm={}, units={}, noise_keywords={}",
            self.batch.input_dir.display(),
            self.batch.output_dir.display(),
            self.batch.max_workers,
            self.batch.image_extensions.join(","),
            self.ocr.languages,
            self.ocr.psm_mode.as_str(),
            self.vocabulary.units.len(),
            self.vocabulary.noise_keywords.len(),
        )
    }
}
