pub mod delete;
pub mod download;
pub mod fetch;
pub mod list;
mod partial;
pub mod share;
pub mod upload;

use chanvault_crypto::{EncryptionKey, ExposeSecret, SecretString};
use chanvault_store::TransferProgress;
use clap::Args;

pub use partial::PartialFile;

/// Passphrase argument shared by the commands that encrypt or decrypt.
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Encryption passphrase.
    #[arg(long, env = "CHANVAULT_KEY", hide_env_values = true)]
    pub key: String,
}

impl KeyArgs {
    pub fn passphrase(&self) -> SecretString {
        SecretString::new(self.key.clone())
    }

    pub fn encryption_key(&self) -> anyhow::Result<EncryptionKey> {
        Ok(EncryptionKey::from_passphrase(
            self.passphrase().expose_secret(),
        )?)
    }
}

/// Progress line on stderr.
pub fn print_progress(verb: &'static str) -> impl Fn(TransferProgress) + Send + Sync + 'static {
    move |p| {
        eprint!("\r{verb} chunk {}/{}", p.completed, p.total);
        if p.completed == p.total {
            eprintln!();
        }
    }
}
