use serde::Deserialize;

use crate::error::{DripError, DripResult};

/// Root application configuration. Loaded from environment variables with
/// the prefix `DRIP_EXPRESS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    /// Optional JSON schedule file; the built-in schedule is used when absent.
    #[serde(default)]
    pub schedule_path: Option<String>,
    /// Optional operator address delivered to first, ahead of the main loop.
    #[serde(default)]
    pub smoke_test_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// API key for the audience/delivery provider. Required; there is no
    /// usable default.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

/// Fixed delays that keep the run inside the provider's rate limits.
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    #[serde(default = "default_max_page_attempts")]
    pub max_page_attempts: u32,
}

// Default functions
fn default_base_url() -> String {
    "https://api.resend.com".to_string()
}
fn default_from_address() -> String {
    "DripExpress <noreply@example.com>".to_string()
}
fn default_page_size() -> u32 {
    100
}
fn default_ledger_path() -> String {
    "data/drip-ledger.json".to_string()
}
fn default_send_delay_ms() -> u64 {
    1200
}
fn default_page_delay_ms() -> u64 {
    600
}
fn default_rate_limit_delay_ms() -> u64 {
    2000
}
fn default_max_page_attempts() -> u32 {
    3
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            from_address: default_from_address(),
            page_size: default_page_size(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            send_delay_ms: default_send_delay_ms(),
            page_delay_ms: default_page_delay_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            max_page_attempts: default_max_page_attempts(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            ledger: LedgerConfig::default(),
            pacing: PacingConfig::default(),
            schedule_path: None,
            smoke_test_address: None,
        }
    }
}

impl PacingConfig {
    /// Zeroed delays, for tests that should not sleep.
    pub fn immediate() -> Self {
        Self {
            send_delay_ms: 0,
            page_delay_ms: 0,
            rate_limit_delay_ms: 0,
            max_page_attempts: default_max_page_attempts(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("DRIP_EXPRESS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Fails fast when the provider credential is absent. Checked before any
    /// network call so a misconfigured run aborts without side effects.
    pub fn require_credentials(&self) -> DripResult<()> {
        if self.provider.api_key.trim().is_empty() {
            return Err(DripError::Config(
                "provider api_key is not set (DRIP_EXPRESS__PROVIDER__API_KEY)".to_string(),
            ));
        }
        Ok(())
    }
}
