//! Small filesystem helpers shared by render and concat operations.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Create a directory tree if it does not exist yet.
pub async fn ensure_dir(path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

/// Verify a produced file exists and is non-empty, returning its size.
pub async fn verify_non_empty(path: impl AsRef<Path>) -> MediaResult<u64> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
    if metadata.len() == 0 {
        return Err(MediaError::EmptyOutput(path.to_path_buf()));
    }
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_dir_creates_tree() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        // Idempotent
        ensure_dir(&nested).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_non_empty() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("clip.mp4");

        assert!(matches!(
            verify_non_empty(&file).await.unwrap_err(),
            MediaError::FileNotFound(_)
        ));

        fs::write(&file, b"").await.unwrap();
        assert!(matches!(
            verify_non_empty(&file).await.unwrap_err(),
            MediaError::EmptyOutput(_)
        ));

        fs::write(&file, b"data").await.unwrap();
        assert_eq!(verify_non_empty(&file).await.unwrap(), 4);
    }
}
