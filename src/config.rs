//! Application configuration management.
//!
//! Configuration is loaded from environment variables via the `envy` crate.
//! The institution base URLs feed the directory resolver; everything else
//! tunes timeouts and the credit-retry compensation policy.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `BANK1_URL` / `BANK2_URL` (optional): account service base URLs,
///   default to the local development ports
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8000
/// - `REQUEST_TIMEOUT_SECS` (optional): per-call timeout for account
///   service operations, defaults to 10
/// - `HEALTH_TIMEOUT_SECS` (optional): liveness probe timeout, defaults to 5
/// - `CREDIT_RETRY_ATTEMPTS` (optional): credit retries before a reversal is
///   attempted, defaults to 3
/// - `CREDIT_RETRY_DELAY_MS` (optional): pause between credit retries,
///   defaults to 500
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bank1_url")]
    pub bank1_url: String,

    #[serde(default = "default_bank2_url")]
    pub bank2_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,

    #[serde(default = "default_credit_retry_attempts")]
    pub credit_retry_attempts: u32,

    #[serde(default = "default_credit_retry_delay")]
    pub credit_retry_delay_ms: u64,
}

fn default_bank1_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_bank2_url() -> String {
    "http://localhost:8002".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    10
}

fn default_health_timeout() -> u64 {
    5
}

fn default_credit_retry_attempts() -> u32 {
    3
}

fn default_credit_retry_delay() -> u64 {
    500
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is read first if present; every variable has a default,
    /// so this only fails on unparseable values.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }
}
