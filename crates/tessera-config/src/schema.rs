//! Configuration sections.

use serde::{Deserialize, Serialize};
use tessera_telemetry::{LogConfig, LogFormat};

/// Logging section.
///
/// # Example
///
/// ```
/// use tessera_config::LoggingConfig;
///
/// let logging = LoggingConfig::default();
/// assert_eq!(logging.level, "info");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Install a global subscriber at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `EnvFilter` directive.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Emit ANSI colors in pretty output.
    #[serde(default)]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_level(),
            format: LogFormat::default(),
            ansi: false,
        }
    }
}

impl LoggingConfig {
    /// Converts the section into the telemetry crate's [`LogConfig`].
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            ansi: self.ansi,
            ..LogConfig::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

/// Request pipeline section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Process-wide debug diagnostics (state transitions at info level).
    #[serde(default)]
    pub debug: bool,

    /// Status code of a success reply when the callback sets none.
    #[serde(default = "default_success_status")]
    pub default_success_status: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_success_status: default_success_status(),
        }
    }
}

fn default_success_status() -> u16 {
    200
}

/// Base options for every cookie set through `set_cookie`.
///
/// `same_site` is kept as text here and checked by
/// [`TesseraConfig::validate`](crate::TesseraConfig::validate); the pipeline
/// turns it into a typed value when a route is bound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CookieDefaults {
    /// `Path` attribute.
    #[serde(default = "default_cookie_path")]
    pub path: String,

    /// `Domain` attribute.
    #[serde(default)]
    pub domain: Option<String>,

    /// `SameSite` attribute: "strict", "lax" or "none".
    #[serde(default = "default_same_site")]
    pub same_site: String,

    /// `Secure` attribute.
    #[serde(default)]
    pub secure: bool,

    /// `HttpOnly` attribute.
    #[serde(default)]
    pub http_only: bool,

    /// `Partitioned` attribute.
    #[serde(default)]
    pub partitioned: bool,

    /// `Max-Age` attribute in seconds.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl Default for CookieDefaults {
    fn default() -> Self {
        Self {
            path: default_cookie_path(),
            domain: None,
            same_site: default_same_site(),
            secure: false,
            http_only: false,
            partitioned: false,
            max_age_secs: None,
        }
    }
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_same_site() -> String {
    "strict".to_string()
}
