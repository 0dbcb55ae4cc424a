//! chanvault CLI
//!
//! Store, list, fetch and share encrypted files kept in a Discord channel.

mod commands;
mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chanvault_crypto::{ExposeSecret, SecretString};
use chanvault_discord::{DiscordConfig, DiscordTransport};
use chanvault_store::{ObjectStore, StoreConfig};
use chanvault_transport::RetryPolicy;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::CliConfig;

/// Encrypted file storage in a Discord channel.
#[derive(Parser, Debug)]
#[command(name = "chanvault", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "CHANVAULT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Discord bot token.
    #[arg(long, env = "CHANVAULT_BOT_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Channel that holds the files.
    #[arg(long, env = "CHANVAULT_CHANNEL", global = true)]
    channel: Option<String>,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt and upload a file.
    Upload(commands::upload::UploadArgs),
    /// List stored files.
    List,
    /// Download and decrypt a file.
    Download(commands::download::DownloadArgs),
    /// Delete every record of a file.
    Delete(commands::delete::DeleteArgs),
    /// Print a share code for a file.
    Share(commands::share::ShareArgs),
    /// Download a file from a share code.
    Fetch(commands::fetch::FetchArgs),
}

/// Store and channel resolved from flags, environment and config file.
pub struct Session {
    pub store: ObjectStore,
    pub channel: String,
}

impl Session {
    fn build(cli: &Cli, config: CliConfig, needs_channel: bool) -> anyhow::Result<Self> {
        let token = cli
            .token
            .clone()
            .map(SecretString::new)
            .or(config.discord.bot_token);
        let channel = cli.channel.clone().or(config.discord.channel_id);

        let (token, channel) = if needs_channel {
            let token = token.context(
                "no bot token: pass --token, set CHANVAULT_BOT_TOKEN or discord.bot_token",
            )?;
            let channel = channel.context(
                "no channel: pass --channel, set CHANVAULT_CHANNEL or discord.channel_id",
            )?;
            (token, channel)
        } else {
            // Share codes carry public attachment URLs; no credential is used.
            (
                token.unwrap_or_else(|| SecretString::new(String::new())),
                channel.unwrap_or_default(),
            )
        };

        let discord = DiscordConfig::new(token.expose_secret())
            .with_api_base(&config.discord.api_base)
            .with_timeout(Duration::from_secs(config.discord.timeout_secs));
        let transport = DiscordTransport::new(discord)?;

        let store_config = StoreConfig::default()
            .with_chunk_size(config.store.chunk_size)
            .with_page_size(config.store.page_size)
            .with_retry(RetryPolicy::from(&config.retry));

        Ok(Self {
            store: ObjectStore::new(transport, store_config),
            channel,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    debug!(path = ?cli.config, "configuration loaded");
    let needs_channel = !matches!(cli.command, Command::Fetch(_));
    let session = Session::build(&cli, config, needs_channel)?;

    match cli.command {
        Command::Upload(args) => commands::upload::run(&session, &args, &cli.format).await,
        Command::List => commands::list::run(&session, &cli.format).await,
        Command::Download(args) => commands::download::run(&session, &args, &cli.format).await,
        Command::Delete(args) => commands::delete::run(&session, &args, &cli.format).await,
        Command::Share(args) => commands::share::run(&session, &args, &cli.format).await,
        Command::Fetch(args) => commands::fetch::run(&session, &args, &cli.format).await,
    }
}
