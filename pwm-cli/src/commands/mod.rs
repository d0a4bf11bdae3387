//! CLI command implementations.

pub mod app;
pub mod generate;
pub mod preset;
pub mod status;
pub mod sync;

use anyhow::Result;
use pwm_client::{HttpTransport, SettingStore, SyncClient, SyncError, SyncStatus};
use std::sync::Arc;

use crate::config::CliConfig;

/// State shared by every command.
pub struct Context {
    /// Settings database.
    pub store: Arc<dyn SettingStore>,
    /// Contents of `pwm.toml`.
    pub config: CliConfig,
    /// Sync status the commands report to.
    pub status: Arc<SyncStatus>,
}

impl Context {
    /// Create a context.
    pub fn new(store: Arc<dyn SettingStore>, config: CliConfig, status: Arc<SyncStatus>) -> Self {
        Self {
            store,
            config,
            status,
        }
    }

    /// A sync client over HTTPS, configured from `pwm.toml`.
    pub fn client(&self) -> Result<SyncClient<HttpTransport>> {
        Ok(SyncClient::new(Arc::clone(&self.store), HttpTransport::new())
            .with_settings(self.config.client_settings()?)
            .with_status(Arc::clone(&self.status)))
    }

    /// Run an auto-only sync after a local edit, if enabled.
    ///
    /// Sync problems are reported but never fail the edit itself.
    pub async fn sync_after_save(&self) -> Result<()> {
        if !self.config.auto_sync_after_save {
            return Ok(());
        }
        match self.client()?.run(true).await {
            Ok(report) => println!(
                "Synced: {} presets changed, {} deleted",
                report.changed_idents, report.deleted_idents
            ),
            Err(e) if e.is_skip() => tracing::debug!("sync after save skipped: {}", e),
            // `sync remove` leaves a token without a server.
            Err(SyncError::InvalidConfig) => tracing::debug!("sync after save skipped: no server"),
            Err(e) => eprintln!("Warning: sync failed: {}", e),
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use pwm_client::SqliteStore;
    use tempfile::TempDir;

    /// A context over a fresh database in a temp dir, with a private
    /// status and no sync config.
    pub(crate) async fn context() -> (TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(&dir.path().join(crate::config::DB_FILE))
            .await
            .unwrap();
        let ctx = Context::new(
            Arc::new(store),
            CliConfig::default(),
            Arc::new(SyncStatus::new()),
        );
        (dir, ctx)
    }
}
