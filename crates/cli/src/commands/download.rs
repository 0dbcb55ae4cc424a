use std::path::{Path, PathBuf};

use anyhow::Context;
use chanvault_store::ProgressFn;
use clap::Args;

use super::{KeyArgs, PartialFile, print_progress};
use crate::{OutputFormat, Session};

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// File id.
    pub file_id: String,
    /// Where to write the file (defaults to the stored name).
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub key: KeyArgs,
}

pub async fn run(
    session: &Session,
    args: &DownloadArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let key = args.key.encryption_key()?;
    // Without --output the stored name is only known once the download ends.
    let staging = args
        .output
        .clone()
        .unwrap_or_else(|| local_name(&args.file_id, &args.file_id));

    let mut partial = PartialFile::create(&staging).await?;
    let progress = print_progress("downloaded");
    let show_progress = matches!(format, OutputFormat::Text);
    let result = session
        .store
        .get_into(
            &session.channel,
            &args.file_id,
            &key,
            partial.writer(),
            show_progress.then_some(&progress as &ProgressFn),
        )
        .await;
    let restored = match result {
        Ok(restored) => restored,
        Err(e) => {
            partial.discard().await;
            return Err(e).with_context(|| format!("failed to download {}", args.file_id));
        }
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| local_name(&restored.name, &args.file_id));
    partial.commit(&output).await?;
    let written = restored.bytes;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "id": args.file_id,
                "path": output.display().to_string(),
                "size": written,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("Wrote {written} bytes to {}", output.display());
        }
    }
    Ok(())
}

/// Final path component of `name`, or `fallback` when it has none.
fn local_name(name: &str, fallback: &str) -> PathBuf {
    Path::new(name)
        .file_name()
        .map_or_else(|| PathBuf::from(fallback), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_strips_directories() {
        assert_eq!(local_name("../../etc/passwd", "id"), PathBuf::from("passwd"));
        assert_eq!(local_name("photo.jpg", "id"), PathBuf::from("photo.jpg"));
        assert_eq!(local_name("..", "id"), PathBuf::from("id"));
        assert_eq!(local_name("", "id"), PathBuf::from("id"));
    }
}
