//! # OCR Instance Manager Module
//!
//! Keeps initialized Tesseract instances keyed by their engine settings so a batch
//! pays the initialization cost once per configuration instead of once per report.

use leptess::LepTess;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::ocr_config::OcrConfig;

/// Pool of Tesseract instances, one per combination of languages, psm, tessdata,
/// user words file and character whitelist.
///
/// Workers lock an instance for the duration of one recognition call; reports
/// processed with the same settings therefore serialize on that instance.
pub struct OcrInstanceManager {
    instances: Mutex<HashMap<String, Arc<Mutex<LepTess>>>>,
}

impl OcrInstanceManager {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    // Every setting applied in get_instance must be part of the key.
    fn instance_key(config: &OcrConfig) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            config.languages,
            config.psm_mode.as_str(),
            config.tessdata_path.as_deref().unwrap_or("default"),
            config.user_words_file.as_deref().unwrap_or("-"),
            config.character_whitelist.as_deref().unwrap_or("-")
        )
    }

    /// Get or create an OCR instance for the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if Tesseract cannot load the requested language data or
    /// rejects one of the configured variables.
    pub fn get_instance(&self, config: &OcrConfig) -> anyhow::Result<Arc<Mutex<LepTess>>> {
        let key = Self::instance_key(config);

        if let Some(instance) = self.instances.lock().get(&key) {
            return Ok(Arc::clone(instance));
        }

        info!(
            languages = %config.languages,
            psm = %config.psm_mode.as_str(),
            "Creating new OCR instance"
        );

        let mut tess = LepTess::new(config.tessdata_path.as_deref(), &config.languages)
            .map_err(|e| anyhow::anyhow!("Failed to initialize Tesseract OCR instance: {}", e))?;

        tess.set_variable(
            leptess::Variable::TesseditPagesegMode,
            config.psm_mode.as_str(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to set PSM mode: {}", e))?;

        if let Some(user_words_path) = &config.user_words_file {
            tess.set_variable(leptess::Variable::UserWordsFile, user_words_path)
                .map_err(|e| anyhow::anyhow!("Failed to set user words file: {}", e))?;
            info!(path = %user_words_path, "Configured Tesseract user words file");
        }

        if let Some(whitelist) = &config.character_whitelist {
            tess.set_variable(leptess::Variable::TesseditCharWhitelist, whitelist)
                .map_err(|e| anyhow::anyhow!("Failed to set character whitelist: {}", e))?;
        }

        let instance = Arc::new(Mutex::new(tess));

        // Another worker may have raced us here; keep whichever landed first.
        let mut instances = self.instances.lock();
        let stored = instances.entry(key).or_insert_with(|| Arc::clone(&instance));
        Ok(Arc::clone(stored))
    }

    /// Drop every cached instance
    pub fn clear(&self) {
        let mut instances = self.instances.lock();
        let count = instances.len();
        instances.clear();
        if count > 0 {
            info!("Cleared {count} OCR instances");
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }
}

impl Default for OcrInstanceManager {
    fn default() -> Self {
        Self::new()
    }
}
