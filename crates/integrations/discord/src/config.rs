use std::time::Duration;

/// Default base URL of the Discord REST API.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Configuration for the Discord transport.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token sent as `Authorization: Bot <token>`.
    pub bot_token: String,

    /// Base URL every endpoint is appended to.
    pub api_base: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DiscordConfig {
    /// Create a new configuration with the given bot token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the API base URL (trailing slashes are dropped).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
