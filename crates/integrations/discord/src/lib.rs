//! Discord transport for chanvault.
//!
//! Implements [`Transport`](chanvault_transport::Transport) on top of the
//! [Discord REST API](https://discord.com/developers/docs/resources/message)
//! using a bot token, so a Discord channel can serve as the storage backend.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use chanvault_discord::{DiscordConfig, DiscordTransport};
//!
//! let config = DiscordConfig::new("bot-token");
//! let transport = DiscordTransport::new(config).expect("client builds");
//! ```

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use config::DiscordConfig;
pub use error::DiscordError;
pub use transport::DiscordTransport;
pub use types::{CreateMessagePayload, RateLimitBody};
