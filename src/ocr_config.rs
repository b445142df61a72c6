//! # OCR Configuration Module
//!
//! Settings for the Tesseract pass that turns a scanned lab report into text:
//! engine options, per-format file size limits and the retry/circuit-breaker policy.

use crate::errors::{AppError, AppResult};

pub const DEFAULT_LANGUAGES: &str = "eng";
pub const FORMAT_DETECTION_BUFFER_SIZE: usize = 32;
pub const MIN_FORMAT_BYTES: usize = 8;
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // scanned reports are often high-DPI
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 512;

/// Retry, timeout and circuit breaker policy around the OCR engine
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts after the first failure
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for one OCR attempt in seconds
    pub operation_timeout_secs: u64,
    /// Consecutive failures before the circuit opens
    pub circuit_breaker_threshold: u32,
    /// Seconds the circuit stays open before a trial request
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            operation_timeout_secs: 60,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60,
        }
    }
}

impl RecoveryConfig {
    /// Validate recovery configuration parameters.
    ///
    /// `max_retries == 0` is allowed and means a single attempt.
    pub fn validate(&self) -> AppResult<()> {
        if self.base_retry_delay_ms == 0 {
            return Err(AppError::Config(
                "base_retry_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_retry_delay_ms < self.base_retry_delay_ms {
            return Err(AppError::Config(format!(
                "max_retry_delay_ms ({}) must be >= base_retry_delay_ms ({})",
                self.max_retry_delay_ms, self.base_retry_delay_ms
            )));
        }
        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(AppError::Config(
                "circuit_breaker_threshold must be greater than 0".to_string(),
            ));
        }
        if self.circuit_breaker_reset_secs == 0 {
            return Err(AppError::Config(
                "circuit_breaker_reset_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Format-specific file size limits
#[derive(Debug, Clone)]
pub struct FormatSizeLimits {
    pub png_max: u64,
    pub jpeg_max: u64,
    /// BMP is uncompressed, so the limit is the lowest
    pub bmp_max: u64,
    /// Multi-page scanner output
    pub tiff_max: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 20 * 1024 * 1024,
            jpeg_max: 15 * 1024 * 1024,
            bmp_max: 10 * 1024 * 1024,
            tiff_max: 30 * 1024 * 1024,
        }
    }
}

impl FormatSizeLimits {
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("png_max", self.png_max),
            ("jpeg_max", self.jpeg_max),
            ("bmp_max", self.bmp_max),
            ("tiff_max", self.tiff_max),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        if self.bmp_max > self.png_max {
            return Err(AppError::Config(format!(
                "bmp_max ({}) should not exceed png_max ({})",
                self.bmp_max, self.png_max
            )));
        }
        Ok(())
    }
}

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text (tabular reports)
    SingleBlock = 6,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Value passed to Tesseract's `tessedit_pageseg_mode`
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SparseText => "11",
        }
    }

    /// Parse the numeric PSM used in `OCR_PSM`
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(PageSegMode::Auto),
            4 => Some(PageSegMode::SingleColumn),
            6 => Some(PageSegMode::SingleBlock),
            11 => Some(PageSegMode::SparseText),
            _ => None,
        }
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract language codes (e.g. "eng", "eng+hin")
    pub languages: String,
    /// Bytes read from the file head for format detection
    pub buffer_size: usize,
    /// Minimum bytes required for format detection
    pub min_format_bytes: usize,
    /// General file size limit in bytes
    pub max_file_size: u64,
    pub format_limits: FormatSizeLimits,
    pub recovery: RecoveryConfig,
    pub psm_mode: PageSegMode,
    /// Tessdata directory; `None` lets Tesseract use `TESSDATA_PREFIX` or its default
    pub tessdata_path: Option<String>,
    /// Upper bound on the estimated decode + OCR memory for one image
    pub memory_limit_mb: u64,
    /// Optional Tesseract user words file (test names, unit spellings)
    pub user_words_file: Option<String>,
    /// Optional restriction of recognised characters
    pub character_whitelist: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            buffer_size: FORMAT_DETECTION_BUFFER_SIZE,
            min_format_bytes: MIN_FORMAT_BYTES,
            max_file_size: MAX_FILE_SIZE,
            format_limits: FormatSizeLimits::default(),
            recovery: RecoveryConfig::default(),
            psm_mode: PageSegMode::default(),
            tessdata_path: None,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            user_words_file: None,
            character_whitelist: None,
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }
        if self
            .languages
            .split('+')
            .any(|lang| lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(AppError::Config(format!(
                "languages '{}' must be '+'-separated Tesseract codes",
                self.languages
            )));
        }
        if self.buffer_size == 0 {
            return Err(AppError::Config(
                "buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.min_format_bytes == 0 || self.min_format_bytes > self.buffer_size {
            return Err(AppError::Config(format!(
                "min_format_bytes ({}) must be in 1..={}",
                self.min_format_bytes, self.buffer_size
            )));
        }
        if self.max_file_size == 0 {
            return Err(AppError::Config(
                "max_file_size must be greater than 0".to_string(),
            ));
        }
        if self.memory_limit_mb == 0 {
            return Err(AppError::Config(
                "memory_limit_mb must be greater than 0".to_string(),
            ));
        }
        if let Some(whitelist) = &self.character_whitelist {
            if whitelist.is_empty() {
                return Err(AppError::Config(
                    "character_whitelist cannot be empty when set".to_string(),
                ));
            }
        }

        self.format_limits.validate()?;
        self.recovery.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(unused_assignments)]
    fn test_recovery_config_validation() {
        let mut config = RecoveryConfig::default();
        assert!(config.validate().is_ok());

        // zero retries is a valid single-attempt policy
        config.max_retries = 0;
        assert!(config.validate().is_ok());

        config.base_retry_delay_ms = 0;
        assert!(config.validate().is_err());
        config.base_retry_delay_ms = 500;

        config.max_retry_delay_ms = 100;
        assert!(config.validate().is_err());
        config.max_retry_delay_ms = 5000;

        config.operation_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.operation_timeout_secs = 60;

        config.circuit_breaker_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_size_limits_validation() {
        let mut limits = FormatSizeLimits::default();
        assert!(limits.validate().is_ok());

        limits.tiff_max = 0;
        assert!(limits.validate().is_err());
        limits.tiff_max = 30 * 1024 * 1024;

        limits.bmp_max = limits.png_max + 1;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_ocr_config_defaults_are_valid() {
        let config = OcrConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.languages, "eng");
        assert_eq!(config.psm_mode, PageSegMode::Auto);
        assert!(config.character_whitelist.is_none());
    }

    #[test]
    fn test_ocr_config_rejects_bad_languages() {
        for languages in ["", "   ", "eng+", "eng fra"] {
            let config = OcrConfig {
                languages: languages.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "accepted {:?}", languages);
        }

        let multi = OcrConfig {
            languages: "eng+hin".to_string(),
            ..Default::default()
        };
        assert!(multi.validate().is_ok());
    }

    #[test]
    fn test_ocr_config_rejects_empty_whitelist() {
        let config = OcrConfig {
            character_whitelist: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_seg_mode_codes() {
        assert_eq!(PageSegMode::from_code(6), Some(PageSegMode::SingleBlock));
        assert_eq!(PageSegMode::SingleBlock.as_str(), "6");
        assert_eq!(PageSegMode::from_code(13), None);
    }
}
