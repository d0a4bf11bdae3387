//! Local settings store.
//!
//! Holds identifier presets, app mappings and the singleton sync config.
//! Every upsert stamps the row with the current time, ignoring the
//! caller's timestamp.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use pwm_types::{AppMapping, IdentifierPreset, SyncConfig, SyncResponse};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record violates a store invariant (e.g. an empty key).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A stored row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Trait for settings storage backends.
#[async_trait]
pub trait SettingStore: Send + Sync {
    /// Every stored preset, ordered by identifier.
    async fn all_presets(&self) -> Result<Vec<IdentifierPreset>, StoreError>;

    /// Every stored app mapping, ordered by package.
    async fn all_app_mappings(&self) -> Result<Vec<AppMapping>, StoreError>;

    /// The preset stored for `identifier`.
    async fn preset_for(&self, identifier: &str) -> Result<Option<IdentifierPreset>, StoreError>;

    /// The mapping stored for package `pkg`.
    async fn app_mapping_for(&self, pkg: &str) -> Result<Option<AppMapping>, StoreError>;

    /// Number of presets stored under `identifier` (0 or 1).
    async fn has_identifier(&self, identifier: &str) -> Result<u32, StoreError>;

    /// Insert or replace presets, stamping each with the current time.
    async fn upsert_presets(&self, presets: &[IdentifierPreset]) -> Result<(), StoreError>;

    /// Insert or replace app mappings, stamping each with the current time.
    async fn upsert_app_mappings(&self, mappings: &[AppMapping]) -> Result<(), StoreError>;

    /// Delete presets by identifier. Returns the number of rows removed.
    async fn delete_presets(&self, identifiers: &[String]) -> Result<u64, StoreError>;

    /// Delete app mappings by package. Returns the number of rows removed.
    async fn delete_app_mappings(&self, pkgs: &[String]) -> Result<u64, StoreError>;

    /// The sync config, if one was ever saved.
    async fn sync_config(&self) -> Result<Option<SyncConfig>, StoreError>;

    /// Save the sync config.
    async fn set_sync_config(&self, config: &SyncConfig) -> Result<(), StoreError>;

    /// Merge a confirmed sync response in one atomic step.
    ///
    /// Deletes `deleted_idents`, upserts `changed_idents`, deletes
    /// `deleted_apps`, upserts `changed_apps`, then saves `config` with
    /// `last_sync` set to the response's `sync_time`. Either everything is
    /// applied or nothing is.
    async fn apply_sync(&self, response: &SyncResponse, config: &SyncConfig)
        -> Result<(), StoreError>;
}

/// Reject presets that would break the non-empty key invariant.
fn check_presets(presets: &[IdentifierPreset]) -> Result<(), StoreError> {
    if presets.iter().any(|p| p.identifier.is_empty()) {
        return Err(StoreError::InvalidRecord("preset with empty identifier".into()));
    }
    Ok(())
}

/// Reject mappings with an empty package or identifier.
fn check_app_mappings(mappings: &[AppMapping]) -> Result<(), StoreError> {
    if mappings.iter().any(|m| m.pkg.is_empty() || m.identifier.is_empty()) {
        return Err(StoreError::InvalidRecord(
            "app mapping with empty package or identifier".into(),
        ));
    }
    Ok(())
}

/// Behaviour every [`SettingStore`] must share, run against each backend.
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use pwm_types::{instant, Token, DEFAULT_SYMBOLS};

    pub(crate) fn response() -> SyncResponse {
        SyncResponse {
            uuid: "exchange-1".into(),
            token: Token::new("tok"),
            sync_time: instant::parse("2024-05-01T08:30:00.125Z").unwrap(),
            changed_idents: vec![
                IdentifierPreset::new("github.com", 2, "#", false),
                IdentifierPreset::new("example.com", 5, "!?", true),
            ],
            changed_apps: vec![AppMapping::new("com.github.android", "github.com")],
            deleted_idents: vec!["stale.example".into()],
            deleted_apps: vec!["org.stale".into()],
        }
    }

    pub(crate) async fn upsert_stamps_now(store: &dyn SettingStore) {
        let before = chrono::Utc::now();
        let preset = IdentifierPreset::new("example.com", 1, DEFAULT_SYMBOLS, true);
        assert_eq!(preset.timestamp, instant::record_default());
        store.upsert_presets(&[preset]).await.unwrap();

        let stored = store.preset_for("example.com").await.unwrap().unwrap();
        assert!(stored.timestamp >= before);
        assert_eq!(stored.iteration, 1);
        assert_eq!(store.has_identifier("example.com").await.unwrap(), 1);
        assert_eq!(store.has_identifier("missing.example").await.unwrap(), 0);
    }

    pub(crate) async fn upsert_replaces(store: &dyn SettingStore) {
        store
            .upsert_presets(&[IdentifierPreset::new("example.com", 1, "!", true)])
            .await
            .unwrap();
        store
            .upsert_presets(&[IdentifierPreset::new("example.com", 9, "#", false)])
            .await
            .unwrap();

        let all = store.all_presets().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].iteration, 9);
        assert!(!all[0].long_mode);
    }

    pub(crate) async fn rejects_empty_keys(store: &dyn SettingStore) {
        let result = store
            .upsert_presets(&[
                IdentifierPreset::new("ok.example", 1, "!", true),
                IdentifierPreset::new("", 1, "!", true),
            ])
            .await;
        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
        assert!(store.all_presets().await.unwrap().is_empty());

        let result = store.upsert_app_mappings(&[AppMapping::new("", "x.example")]).await;
        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
    }

    pub(crate) async fn app_mappings_roundtrip(store: &dyn SettingStore) {
        store
            .upsert_app_mappings(&[
                AppMapping::new("org.b", "b.example"),
                AppMapping::new("org.a", "a.example"),
            ])
            .await
            .unwrap();

        let all = store.all_app_mappings().await.unwrap();
        let pkgs: Vec<_> = all.iter().map(|m| m.pkg.as_str()).collect();
        assert_eq!(pkgs, vec!["org.a", "org.b"]);

        let mapping = store.app_mapping_for("org.b").await.unwrap().unwrap();
        assert_eq!(mapping.identifier, "b.example");

        assert_eq!(store.delete_app_mappings(&["org.a".into(), "org.zzz".into()]).await.unwrap(), 1);
        assert!(store.app_mapping_for("org.a").await.unwrap().is_none());
    }

    pub(crate) async fn delete_presets_counts(store: &dyn SettingStore) {
        store
            .upsert_presets(&[
                IdentifierPreset::new("a.example", 1, "!", true),
                IdentifierPreset::new("b.example", 1, "!", true),
            ])
            .await
            .unwrap();
        let removed = store
            .delete_presets(&["a.example".into(), "nope.example".into()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.delete_presets(&[]).await.unwrap(), 0);
        assert_eq!(store.all_presets().await.unwrap().len(), 1);
    }

    pub(crate) async fn sync_config_roundtrip(store: &dyn SettingStore) {
        assert!(store.sync_config().await.unwrap().is_none());

        let mut config = SyncConfig::new("sync.example.com", 8443, "tok").with_auto_sync(false);
        config.last_sync = instant::parse("2024-02-03T04:05:06.789Z").unwrap();
        store.set_sync_config(&config).await.unwrap();
        assert_eq!(store.sync_config().await.unwrap(), Some(config.clone()));

        config.server_port = 9000;
        store.set_sync_config(&config).await.unwrap();
        assert_eq!(store.sync_config().await.unwrap().unwrap().server_port, 9000);
    }

    pub(crate) async fn apply_sync_merges(store: &dyn SettingStore) {
        store
            .upsert_presets(&[
                IdentifierPreset::new("stale.example", 1, "!", true),
                IdentifierPreset::new("github.com", 1, "!", true),
                IdentifierPreset::new("keep.example", 3, "%", true),
            ])
            .await
            .unwrap();
        store
            .upsert_app_mappings(&[AppMapping::new("org.stale", "stale.example")])
            .await
            .unwrap();
        let config = SyncConfig::new("sync.example.com", 8443, "tok");
        let response = response();

        store.apply_sync(&response, &config).await.unwrap();

        let idents: Vec<_> = store
            .all_presets()
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.identifier, p.iteration))
            .collect();
        assert_eq!(
            idents,
            vec![
                ("example.com".to_string(), 5),
                ("github.com".to_string(), 2),
                ("keep.example".to_string(), 3),
            ]
        );

        let apps = store.all_app_mappings().await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].pkg, "com.github.android");

        let saved = store.sync_config().await.unwrap().unwrap();
        assert_eq!(saved.last_sync, response.sync_time);
        assert_eq!(saved.server_host, "sync.example.com");
    }

    pub(crate) async fn apply_sync_is_idempotent(store: &dyn SettingStore) {
        let config = SyncConfig::new("sync.example.com", 8443, "tok");
        let response = response();

        store.apply_sync(&response, &config).await.unwrap();
        let once_presets = store.all_presets().await.unwrap();
        let once_apps = store.all_app_mappings().await.unwrap();
        let once_config = store.sync_config().await.unwrap();

        store.apply_sync(&response, &config).await.unwrap();
        let twice_presets = store.all_presets().await.unwrap();
        let twice_apps = store.all_app_mappings().await.unwrap();

        assert_eq!(once_presets.len(), twice_presets.len());
        for (once, twice) in once_presets.iter().zip(&twice_presets) {
            assert!(once.same_settings(twice));
        }
        let strip = |apps: Vec<AppMapping>| -> Vec<(String, String)> {
            apps.into_iter().map(|a| (a.pkg, a.identifier)).collect()
        };
        assert_eq!(strip(once_apps), strip(twice_apps));
        assert_eq!(once_config, store.sync_config().await.unwrap());
    }

    pub(crate) async fn apply_sync_rejects_whole_batch(store: &dyn SettingStore) {
        store
            .upsert_presets(&[IdentifierPreset::new("stale.example", 1, "!", true)])
            .await
            .unwrap();
        let mut response = response();
        response.changed_idents.push(IdentifierPreset::new("", 1, "!", true));
        let config = SyncConfig::new("sync.example.com", 8443, "tok");

        assert!(store.apply_sync(&response, &config).await.is_err());

        let idents: Vec<_> = store
            .all_presets()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.identifier)
            .collect();
        assert_eq!(idents, vec!["stale.example".to_string()]);
        assert!(store.sync_config().await.unwrap().is_none());
    }
}
