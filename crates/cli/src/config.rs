use std::path::Path;

use anyhow::Context;
use chanvault_crypto::SecretString;
use chanvault_discord::config::DEFAULT_API_BASE;
use chanvault_store::DEFAULT_CHUNK_SIZE;
use chanvault_transport::RetryConfig;
use serde::Deserialize;

/// Contents of the optional TOML configuration file.
///
/// ```toml
/// [discord]
/// bot_token = "..."
/// channel_id = "1100000000000000001"
///
/// [store]
/// chunk_size = 18874368
///
/// [retry]
/// max_retries = 3
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub discord: DiscordSection,
    pub store: StoreSection,
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiscordSection {
    pub bot_token: Option<SecretString>,
    pub channel_id: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for DiscordSection {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel_id: None,
            api_base: DEFAULT_API_BASE.to_owned(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub chunk_size: usize,
    pub page_size: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: 100,
        }
    }
}

impl CliConfig {
    /// Load the file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
