use std::path::{Path, PathBuf};

use color_eyre::eyre::Result;

/// Port trait for where uploaded media bytes live.
///
/// Implementations live in `services::media_store` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` under `file_name` and return the stored path.
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Remove a previously stored file. Missing files are not an error.
    async fn remove(&self, path: &Path) -> Result<()>;
}
