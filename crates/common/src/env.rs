//! Environment/runtime helpers
//!
//! Sanity checks to ensure the storage directory exists at startup.

use std::path::Path;

use tracing::{debug, warn};

/// Ensure the parent directory of the storage file exists.
pub async fn ensure_env(storage_path: &str) -> anyhow::Result<()> {
    let Some(parent) = Path::new(storage_path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    if tokio::fs::metadata(parent).await.is_err() {
        warn!(dir = %parent.display(), "storage directory not found; creating it");
    }
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
    debug!(dir = %parent.display(), "storage directory ready");
    Ok(())
}
