//! # Observability Configuration
//!
//! Environment-driven settings for logging and the optional metrics snapshot.

use std::env;

use crate::errors::{AppError, AppResult};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration for different environments
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Log level applied to this crate's targets
    pub log_level: String,
    /// Explicit format override; `None` picks pretty in development, JSON elsewhere
    pub log_format: Option<LogFormat>,
    /// Where to write the Prometheus text snapshot after a batch
    pub metrics_snapshot_path: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: None,
            metrics_snapshot_path: None,
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("pretty") => Some(LogFormat::Pretty),
            Some("json") => Some(LogFormat::Json),
            _ => None,
        };

        Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_level: lookup("LOG_LEVEL")
                .unwrap_or_else(|| "info".to_string())
                .to_lowercase(),
            log_format,
            metrics_snapshot_path: lookup("METRICS_SNAPSHOT_PATH").filter(|p| !p.trim().is_empty()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Resolved log format
    pub fn effective_log_format(&self) -> LogFormat {
        match self.log_format {
            Some(format) => format,
            None if self.is_development() => LogFormat::Pretty,
            None => LogFormat::Json,
        }
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_snapshot_path.is_some()
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.environment.trim().is_empty() {
            return Err(AppError::Config("ENVIRONMENT cannot be empty".to_string()));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AppError::Config(format!(
                "Invalid log level '{}', expected one of {:?}",
                self.log_level, LOG_LEVELS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid_development() {
        let config = ObservabilityConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_development());
        assert_eq!(config.effective_log_format(), LogFormat::Pretty);
        assert!(!config.metrics_enabled());
    }

    #[test]
    fn test_production_defaults_to_json() {
        let config = ObservabilityConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
        assert_eq!(config.effective_log_format(), LogFormat::Json);

        let forced = ObservabilityConfig {
            log_format: Some(LogFormat::Pretty),
            ..config
        };
        assert_eq!(forced.effective_log_format(), LogFormat::Pretty);
    }

    #[test]
    fn test_from_lookup() {
        let config = ObservabilityConfig::from_lookup(|key| match key {
            "ENVIRONMENT" => Some("staging".to_string()),
            "LOG_LEVEL" => Some("DEBUG".to_string()),
            "LOG_FORMAT" => Some("json".to_string()),
            "METRICS_SNAPSHOT_PATH" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.environment, "staging");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, Some(LogFormat::Json));
        assert!(!config.metrics_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let config = ObservabilityConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
