use chanvault_crypto::ExposeSecret;
use clap::Args;

use super::KeyArgs;
use crate::{OutputFormat, Session};

#[derive(Args, Debug)]
pub struct ShareArgs {
    /// File id.
    pub file_id: String,
    #[command(flatten)]
    pub key: KeyArgs,
}

pub async fn run(session: &Session, args: &ShareArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let passphrase = args.key.passphrase();
    let code = session
        .store
        .share_code(&session.channel, &args.file_id, passphrase.expose_secret())
        .await?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "id": args.file_id, "code": code });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            eprintln!("Anyone holding this code can read the file.");
            println!("{code}");
        }
    }
    Ok(())
}
