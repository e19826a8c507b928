use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};

use crate::ports::media_store::MediaStore;

/// Stores media as flat files inside one directory.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .wrap_err_with(|| format!("Failed to create upload directory: {}", root.display()))?;
        Ok(Self { root })
    }
}

#[async_trait::async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .wrap_err_with(|| format!("Failed to write media file: {}", path.display()))?;
        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Media file already gone: {}", path.display());
                Ok(())
            }
            Err(e) => Err(e)
                .wrap_err_with(|| format!("Failed to remove media file: {}", path.display())),
        }
    }
}
