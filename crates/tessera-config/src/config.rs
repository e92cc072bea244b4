//! Main configuration types.
//!
//! This module provides the top-level [`TesseraConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use tessera_telemetry::{LogConfig, LogFormat};

use crate::{ConfigError, CookieDefaults, LoggingConfig, PipelineConfig};

const SAME_SITE_VALUES: [&str; 3] = ["strict", "lax", "none"];

/// Complete Tessera configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use tessera_config::TesseraConfig;
///
/// let config = TesseraConfig::default();
/// assert_eq!(config.pipeline.default_success_status, 200);
/// assert_eq!(config.cookies.same_site, "strict");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TesseraConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Request pipeline configuration.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Default cookie options.
    #[serde(default)]
    pub cookies: CookieDefaults,
}

impl TesseraConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> TesseraConfigBuilder {
        TesseraConfigBuilder::new()
    }

    /// Development preset: debug diagnostics and pretty debug-level logs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                ansi: true,
                ..LoggingConfig::default()
            },
            pipeline: PipelineConfig {
                debug: true,
                ..PipelineConfig::default()
            },
            cookies: CookieDefaults::default(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `pipeline.default_success_status` is not a 2xx code
    /// - `logging.level` is not a valid filter directive
    /// - `cookies.path` does not start with `/`
    /// - `cookies.same_site` is not "strict", "lax" or "none"
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(200..300).contains(&self.pipeline.default_success_status) {
            return Err(ConfigError::invalid_value(
                "pipeline.default_success_status",
                format!(
                    "expected a 2xx status code, got {}",
                    self.pipeline.default_success_status
                ),
            ));
        }

        if let Err(e) = tessera_telemetry::create_env_filter(&self.logging.level) {
            return Err(ConfigError::invalid_value("logging.level", e.to_string()));
        }

        if !self.cookies.path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "cookies.path",
                format!("must start with '/', got '{}'", self.cookies.path),
            ));
        }

        if !SAME_SITE_VALUES
            .iter()
            .any(|v| v.eq_ignore_ascii_case(&self.cookies.same_site))
        {
            return Err(ConfigError::invalid_value(
                "cookies.same_site",
                format!(
                    "expected 'strict', 'lax' or 'none', got '{}'",
                    self.cookies.same_site
                ),
            ));
        }

        Ok(())
    }

    /// Applies the process-wide settings and returns the logging setup.
    ///
    /// Sets the debug flag read by the pipeline; the caller passes the
    /// returned [`LogConfig`] to `tessera_telemetry::init_logging`.
    #[must_use]
    pub fn apply(&self) -> LogConfig {
        tessera_core::set_debug(self.pipeline.debug);
        self.logging.to_log_config()
    }
}

/// Builder for [`TesseraConfig`].
#[derive(Debug, Default)]
pub struct TesseraConfigBuilder {
    logging: Option<LoggingConfig>,
    pipeline: Option<PipelineConfig>,
    cookies: Option<CookieDefaults>,
}

impl TesseraConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the pipeline section.
    #[must_use]
    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Set the cookie defaults.
    #[must_use]
    pub fn cookies(mut self, cookies: CookieDefaults) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> TesseraConfig {
        TesseraConfig {
            logging: self.logging.unwrap_or_default(),
            pipeline: self.pipeline.unwrap_or_default(),
            cookies: self.cookies.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TesseraConfig::default().validate().is_ok());
        assert!(TesseraConfig::development().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TesseraConfig::builder()
            .pipeline(PipelineConfig {
                default_success_status: 201,
                ..PipelineConfig::default()
            })
            .build();
        assert_eq!(config.pipeline.default_success_status, 201);
        assert_eq!(config.cookies, CookieDefaults::default());
    }

    #[test]
    fn test_rejects_non_2xx_status() {
        let config = TesseraConfig::builder()
            .pipeline(PipelineConfig {
                default_success_status: 302,
                ..PipelineConfig::default()
            })
            .build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pipeline.default_success_status"));
    }

    #[test]
    fn test_rejects_bad_level() {
        let config = TesseraConfig::builder()
            .logging(LoggingConfig {
                level: "tessera=loud".to_string(),
                ..LoggingConfig::default()
            })
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "logging.level"
        ));
    }

    #[test]
    fn test_rejects_relative_cookie_path() {
        let config = TesseraConfig::builder()
            .cookies(CookieDefaults {
                path: "api".to_string(),
                ..CookieDefaults::default()
            })
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_site_case_insensitive() {
        let mut config = TesseraConfig::default();
        config.cookies.same_site = "Lax".to_string();
        assert!(config.validate().is_ok());

        config.cookies.same_site = "sometimes".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_sets_debug_flag() {
        let config = TesseraConfig::development();
        let log = config.apply();
        assert!(tessera_core::debug_enabled());
        assert_eq!(log.format, LogFormat::Pretty);

        let _ = TesseraConfig::default().apply();
        assert!(!tessera_core::debug_enabled());
    }
}
