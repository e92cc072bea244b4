//! Typed configuration for Tessera.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides (`PREFIX__SECTION__KEY`)
//! - Strict parsing (unknown fields are rejected)
//! - Layered loading (defaults → file → env)
//!
//! # Example
//!
//! ```no_run
//! use tessera_config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("tessera.toml")?
//!     .with_env_prefix("TESSERA")
//!     .load()?;
//!
//! tessera_telemetry::init_logging(&config.apply())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [pipeline]
//! debug = false
//! default_success_status = 200
//!
//! [cookies]
//! path = "/"
//! same_site = "strict"
//! secure = true
//! http_only = true
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{TesseraConfig, TesseraConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{CookieDefaults, LoggingConfig, PipelineConfig};
