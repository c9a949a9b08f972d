//! Configuration for stablepay-cli.
//!
//! Handles loading configuration from a TOML file, with CLI arguments
//! and environment variables layered on top.

use serde::Deserialize;
use stablepay_core::processors::TokenConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub token: TokenSection,
    #[serde(default)]
    pub record: Option<RecordConfig>,
}

/// Payment service configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the payment integration service.
    pub base_url: Url,
    /// Integration identifier issued by the payment service.
    pub integration_id: String,
}

/// Settlement token configuration section.
///
/// Every field falls back to the USDC-on-Base default, so the section
/// can be omitted entirely or filled in one field at a time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenSection {
    /// Settlement chain name, e.g. "BASE".
    pub chain: String,
    /// Settlement token name, e.g. "USDC".
    pub stablecoin: String,
    /// ERC-20 contract address of the settlement token.
    pub token_contract: String,
    /// EIP-155 chain id used in transfer URIs.
    pub chain_id: u64,
    /// Decimals of the settlement token.
    pub token_decimals: u32,
}

impl Default for TokenSection {
    fn default() -> Self {
        let token = TokenConfig::default();
        Self {
            chain: token.chain,
            stablecoin: token.stablecoin,
            token_contract: token.token_contract,
            chain_id: token.chain_id,
            token_decimals: token.token_decimals,
        }
    }
}

impl From<TokenSection> for TokenConfig {
    fn from(section: TokenSection) -> Self {
        TokenConfig {
            chain: section.chain,
            stablecoin: section.stablecoin,
            token_contract: section.token_contract,
            chain_id: section.chain_id,
            token_decimals: section.token_decimals,
        }
    }
}

/// Payment recording configuration section.
///
/// When present, settled payments are reported to this service after the
/// receipt is printed.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordConfig {
    /// Base URL of the service that records settled payments.
    pub base_url: Url,
    /// Custom payment method identifier settlements are recorded under.
    pub cpm_id: String,
    /// Product name attached to recorded payments.
    #[serde(default)]
    pub product_name: Option<String>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    base_url_override: Option<Url>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, base_url_override: Option<Url>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            base_url_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    pub fn load(&self) -> Result<FileConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(base_url) = &self.base_url_override {
            file_config.api.base_url = base_url.clone();
        }

        self.validate(&file_config)?;

        Ok(file_config)
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.api.integration_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "api.integration_id must not be empty".to_string(),
            ));
        }
        if !config.token.token_contract.starts_with("0x") {
            return Err(ConfigError::ValidationError(format!(
                "token.token_contract {} is not a 0x-prefixed address",
                config.token.token_contract
            )));
        }
        if let Some(record) = &config.record {
            if record.cpm_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "record.cpm_id must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
