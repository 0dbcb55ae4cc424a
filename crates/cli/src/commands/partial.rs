use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::warn;

/// A download written under a `.part` sibling name and moved into place only
/// once it is complete, so a failed download never touches the target.
pub struct PartialFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl PartialFile {
    /// Create the partial file next to `target`.
    pub async fn create(target: &Path) -> anyhow::Result<Self> {
        let path = partial_path(target);
        let file = File::create(&path)
            .await
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn writer(&mut self) -> &mut BufWriter<File> {
        &mut self.writer
    }

    /// Move the finished download to `dest`, replacing any existing file.
    pub async fn commit(mut self, dest: &Path) -> anyhow::Result<()> {
        let moved = async {
            self.writer.flush().await?;
            self.writer.get_ref().sync_all().await?;
            tokio::fs::rename(&self.path, dest).await
        }
        .await;
        if let Err(e) = moved {
            let path = self.path.clone();
            self.discard().await;
            return Err(e).with_context(|| {
                format!("failed to move {} to {}", path.display(), dest.display())
            });
        }
        Ok(())
    }

    /// Remove the partial file.
    pub async fn discard(self) {
        let Self { path, writer } = self;
        drop(writer);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "failed to remove partial download");
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(|| OsString::from("download"), OsString::from);
    name.push(".part");
    target.with_file_name(name)
}
