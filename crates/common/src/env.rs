//! Environment/runtime helpers
//!
//! Sanity checks run at startup before the store is opened.

use std::path::Path;

use anyhow::{anyhow, Context};
use tracing::{debug, warn};

/// Create the data directory if needed and make sure it is writable.
pub async fn ensure_data_dir(data_dir: impl AsRef<Path>) -> anyhow::Result<()> {
    let dir = data_dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create data directory {}", dir.display()))?;
    let meta = tokio::fs::metadata(dir)
        .await
        .with_context(|| format!("cannot inspect data directory {}", dir.display()))?;
    if !meta.is_dir() {
        return Err(anyhow!("{} exists but is not a directory", dir.display()));
    }
    if meta.permissions().readonly() {
        warn!(data_dir = %dir.display(), "data directory is read-only");
        return Err(anyhow!("data directory {} is read-only", dir.display()));
    }
    debug!(data_dir = %dir.display(), "data directory ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn creates_nested_dirs() -> anyhow::Result<()> {
        let root = std::env::temp_dir().join(format!("common_env_{}", Uuid::new_v4()));
        let nested = root.join("a").join("b");
        ensure_data_dir(&nested).await?;
        assert!(nested.is_dir());
        ensure_data_dir(&nested).await?;
        let _ = tokio::fs::remove_dir_all(&root).await;
        Ok(())
    }

    #[tokio::test]
    async fn a_file_in_the_way_is_an_error() -> anyhow::Result<()> {
        let file = std::env::temp_dir().join(format!("common_env_file_{}", Uuid::new_v4()));
        tokio::fs::write(&file, b"x").await?;
        let err = ensure_data_dir(&file).await.unwrap_err();
        assert!(err.to_string().contains(&file.display().to_string()));
        let _ = tokio::fs::remove_file(&file).await;
        Ok(())
    }
}
