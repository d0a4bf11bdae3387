//! Configuration management for pwm.
//!
//! Everything lives in one data directory: the settings database and an
//! optional `pwm.toml` with client tunables. Sync server settings are not
//! here; they are stored in the database with the presets.

use anyhow::{Context, Result};
use pwm_client::{ClientSettings, Scheme, SqliteStore};
use pwm_types::DEFAULT_SYMBOLS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the optional config file inside the data directory.
pub const CONFIG_FILE: &str = "pwm.toml";

/// Name of the settings database inside the data directory.
pub const DB_FILE: &str = "settings.db";

/// Contents of `pwm.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Limit for `/sync` and `/confirm`, in seconds.
    pub request_timeout_secs: u64,
    /// Connect limit for every request, in seconds.
    pub connect_timeout_secs: u64,
    /// Alphabet for identifiers without a preset.
    pub default_symbols: String,
    /// Run an auto-only sync after `generate --save` and preset edits.
    pub auto_sync_after_save: bool,
    /// `https` or `http`.
    pub scheme: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            log_level: "warn".to_string(),
            request_timeout_secs: client.request_timeout.as_secs(),
            connect_timeout_secs: client.connect_timeout.as_secs(),
            default_symbols: DEFAULT_SYMBOLS.to_string(),
            auto_sync_after_save: true,
            scheme: client.scheme.to_string(),
        }
    }
}

impl CliConfig {
    /// Load `pwm.toml` from a directory, falling back to defaults when the
    /// file does not exist.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Self::default());
        }
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Client tunables derived from this config.
    pub fn client_settings(&self) -> Result<ClientSettings> {
        let scheme: Scheme = self
            .scheme
            .parse()
            .with_context(|| format!("Invalid scheme {:?} in {}", self.scheme, CONFIG_FILE))?;
        Ok(ClientSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            scheme,
            ..ClientSettings::default()
        })
    }
}

/// Open (creating if needed) the settings database in `data_dir`.
pub async fn open_store(data_dir: &Path) -> Result<SqliteStore> {
    let path = data_dir.join(DB_FILE);
    let store = SqliteStore::new(&path)
        .await
        .with_context(|| format!("Failed to open settings database {}", path.display()))?;
    set_file_permissions_0600(&path).await?;
    Ok(store)
}

/// Create the data directory if needed.
///
/// Only a directory created here is restricted to 0700; an existing
/// directory keeps its permissions.
pub async fn prepare_data_dir(path: &Path) -> Result<()> {
    let existed = tokio::fs::try_exists(path).await.unwrap_or(false);
    tokio::fs::create_dir_all(path)
        .await
        .context("Failed to create data directory")?;
    if !existed {
        set_dir_permissions_0700(path).await?;
    }
    Ok(())
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
