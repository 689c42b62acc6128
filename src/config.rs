use config::{Config, Environment, File};
use serde::Deserialize;
use validator::Validate;

use crate::errors::ServiceError;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PDF_OUTPUT_DIR: &str = ".";
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base URL of the quotation/catalog services.
    #[serde(default = "default_api_base_url")]
    #[validate(url)]
    pub api_base_url: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Application environment.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging).
    #[serde(default)]
    pub log_json: bool,

    /// Directory PDF exports are written to.
    #[serde(default = "default_pdf_output_dir")]
    #[validate(length(min = 1))]
    pub pdf_output_dir: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_pdf_output_dir() -> String {
    DEFAULT_PDF_OUTPUT_DIR.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            pdf_output_dir: default_pdf_output_dir(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `config/<environment>` (optional) layered
    /// with `QUOTELINE_`-prefixed environment variables, then validates it.
    pub fn load() -> Result<Self, ServiceError> {
        let environment =
            std::env::var("QUOTELINE_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
            .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
            .add_source(Environment::with_prefix("QUOTELINE"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("quoteline={}", level);
    let filter_directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}
