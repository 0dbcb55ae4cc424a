use std::path::PathBuf;

use anyhow::Context;
use chanvault_core::ShareCode;
use chanvault_store::ProgressFn;
use clap::Args;

use super::{PartialFile, print_progress};
use crate::{OutputFormat, Session};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Share code.
    pub code: String,
    /// Where to write the file (defaults to the shared name).
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn run(session: &Session, args: &FetchArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let shared = ShareCode::decode(&args.code)?;
    let output = match &args.output {
        Some(path) => path.clone(),
        None => PathBuf::from(&shared.file_name)
            .file_name()
            .map(PathBuf::from)
            .context("share code carries no usable file name; pass --output")?,
    };

    let mut partial = PartialFile::create(&output).await?;
    let progress = print_progress("downloaded");
    let show_progress = matches!(format, OutputFormat::Text);
    let result = session
        .store
        .get_shared(
            &args.code,
            partial.writer(),
            show_progress.then_some(&progress as &ProgressFn),
        )
        .await;
    let name = match result {
        Ok(name) => name,
        Err(e) => {
            partial.discard().await;
            return Err(e).context("failed to fetch shared file");
        }
    };
    partial.commit(&output).await?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "name": name,
                "path": output.display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("Wrote {name} to {}", output.display());
        }
    }
    Ok(())
}
