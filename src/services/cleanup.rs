//! Cleanup service for stale pipeline scratch directories and expired
//! refresh tokens.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use crate::db::{refresh_tokens, DbPool};

/// Configuration for the cleanup service.
#[derive(Clone)]
pub struct CleanupConfig {
    /// Directory holding per-job scratch subdirectories
    pub data_dir: PathBuf,
    /// Scratch/token retention period in hours
    pub retention_hours: u64,
    /// How often to run cleanup (in seconds)
    pub interval_secs: u64,
}

/// Start the cleanup background task.
///
/// This spawns a tokio task that periodically removes scratch directories
/// left behind by crashed pipeline tasks and soft-deletes refresh tokens
/// past their expiry.
pub fn start_cleanup_task(pool: DbPool, config: CleanupConfig) {
    tokio::spawn(async move {
        info!(
            "Starting cleanup service (retention: {} hours, interval: {} seconds)",
            config.retention_hours, config.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(config.interval_secs));

        loop {
            ticker.tick().await;

            if let Err(e) = run_cleanup(&pool, &config).await {
                error!("Cleanup task error: {}", e);
            }
        }
    });
}

/// Run a single cleanup cycle.
async fn run_cleanup(
    pool: &DbPool,
    config: &CleanupConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    cleanup_stale_scratch(config).await?;
    cleanup_expired_tokens(pool, config).await?;
    Ok(())
}

/// Remove scratch directories whose last modification is older than the
/// retention period. A running pipeline touches its directory on every file
/// write, so anything this old belongs to a dead task.
async fn cleanup_stale_scratch(
    config: &CleanupConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let scratch_root = config.data_dir.join("scratch");

    let mut entries = match tokio::fs::read_dir(&scratch_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let max_age = Duration::from_secs(config.retention_hours * 3600);
    let mut deleted_count = 0;
    let mut error_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Failed to stat scratch directory {}: {}", path.display(), e);
                error_count += 1;
                continue;
            }
        };
        let age = match modified.elapsed() {
            Ok(age) => age,
            // Clock went backwards, treat as fresh.
            Err(_) => continue,
        };
        if age < max_age {
            continue;
        }

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!("Deleted stale scratch directory {}", path.display());
                deleted_count += 1;
            }
            Err(e) => {
                warn!(
                    "Failed to delete scratch directory {}: {}",
                    path.display(),
                    e
                );
                error_count += 1;
            }
        }
    }

    if deleted_count > 0 || error_count > 0 {
        info!(
            "Scratch cleanup: {} deleted, {} errors",
            deleted_count, error_count
        );
    }

    Ok(())
}

/// Soft-delete refresh tokens expired or revoked longer ago than the
/// retention period.
async fn cleanup_expired_tokens(
    pool: &DbPool,
    config: &CleanupConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let purged =
        refresh_tokens::cleanup_expired(pool.connection(), config.retention_hours * 3600).await?;

    if purged > 0 {
        info!("Refresh token cleanup: {} tokens purged", purged);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn config_with(dir: &std::path::Path, retention_hours: u64) -> CleanupConfig {
        CleanupConfig {
            data_dir: dir.to_path_buf(),
            retention_hours,
            interval_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_missing_scratch_root_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(dir.path(), 24);
        assert!(cleanup_stale_scratch(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_fresh_directories_survive() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch").join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&scratch).await.unwrap();

        let config = config_with(dir.path(), 24);
        cleanup_stale_scratch(&config).await.unwrap();

        assert!(scratch.exists());
    }

    #[tokio::test]
    async fn test_zero_retention_removes_stale_directories() {
        let dir = tempfile::tempdir().unwrap();
        let scratch_root = dir.path().join("scratch");
        let a = scratch_root.join(Uuid::now_v7().to_string());
        let b = scratch_root.join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&a).await.unwrap();
        tokio::fs::create_dir_all(&b).await.unwrap();
        tokio::fs::write(scratch_root.join("stray.txt"), b"x")
            .await
            .unwrap();

        // Let the mtimes age past the zero retention window.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let config = config_with(dir.path(), 0);
        cleanup_stale_scratch(&config).await.unwrap();

        assert!(!a.exists());
        assert!(!b.exists());
        // Loose files in the scratch root are not scratch dirs and stay.
        assert!(scratch_root.join("stray.txt").exists());
    }
}
