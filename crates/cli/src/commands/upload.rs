use std::path::PathBuf;

use anyhow::Context;
use chanvault_store::{ProgressFn, Upload};
use clap::Args;

use super::{KeyArgs, print_progress};
use crate::{OutputFormat, Session};

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// File to upload.
    pub path: PathBuf,
    /// Name to store (defaults to the file name).
    #[arg(long)]
    pub name: Option<String>,
    /// Media type recorded with the file.
    #[arg(long, default_value = "application/octet-stream")]
    pub media_type: String,
    #[command(flatten)]
    pub key: KeyArgs,
}

pub async fn run(session: &Session, args: &UploadArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let file = tokio::fs::File::open(&args.path)
        .await
        .with_context(|| format!("failed to open {}", args.path.display()))?;
    let size = file.metadata().await?.len();
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("path has no file name; pass --name")?,
    };

    let key = args.key.encryption_key()?;
    let upload = Upload::new(file, size, name.clone()).media_type(args.media_type.clone());
    let progress = print_progress("uploaded");
    let show_progress = matches!(format, OutputFormat::Text);
    let id = session
        .store
        .put(
            &session.channel,
            upload,
            &key,
            show_progress.then_some(&progress as &ProgressFn),
        )
        .await?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "id": id, "name": name, "size": size });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("Uploaded {name} ({size} bytes) as {id}");
        }
    }
    Ok(())
}
