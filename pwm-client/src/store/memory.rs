//! In-memory settings store (tests and ephemeral sessions).

use super::{check_app_mappings, check_presets, SettingStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use pwm_types::{AppMapping, IdentifierPreset, SyncConfig, SyncResponse};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Settings store backed by ordered maps behind one async mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default, Clone)]
struct MemoryState {
    presets: BTreeMap<String, IdentifierPreset>,
    apps: BTreeMap<String, AppMapping>,
    config: Option<SyncConfig>,
}

impl MemoryState {
    fn upsert_presets(&mut self, presets: &[IdentifierPreset]) {
        let now = Utc::now();
        for preset in presets {
            let mut row = preset.clone();
            row.timestamp = now;
            self.presets.insert(row.identifier.clone(), row);
        }
    }

    fn upsert_app_mappings(&mut self, mappings: &[AppMapping]) {
        let now = Utc::now();
        for mapping in mappings {
            let mut row = mapping.clone();
            row.timestamp = now;
            self.apps.insert(row.pkg.clone(), row);
        }
    }

    fn delete_presets(&mut self, identifiers: &[String]) -> u64 {
        identifiers
            .iter()
            .filter(|id| self.presets.remove(id.as_str()).is_some())
            .count() as u64
    }

    fn delete_app_mappings(&mut self, pkgs: &[String]) -> u64 {
        pkgs.iter()
            .filter(|pkg| self.apps.remove(pkg.as_str()).is_some())
            .count() as u64
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingStore for MemoryStore {
    async fn all_presets(&self) -> Result<Vec<IdentifierPreset>, StoreError> {
        Ok(self.state.lock().await.presets.values().cloned().collect())
    }

    async fn all_app_mappings(&self) -> Result<Vec<AppMapping>, StoreError> {
        Ok(self.state.lock().await.apps.values().cloned().collect())
    }

    async fn preset_for(&self, identifier: &str) -> Result<Option<IdentifierPreset>, StoreError> {
        Ok(self.state.lock().await.presets.get(identifier).cloned())
    }

    async fn app_mapping_for(&self, pkg: &str) -> Result<Option<AppMapping>, StoreError> {
        Ok(self.state.lock().await.apps.get(pkg).cloned())
    }

    async fn has_identifier(&self, identifier: &str) -> Result<u32, StoreError> {
        Ok(u32::from(
            self.state.lock().await.presets.contains_key(identifier),
        ))
    }

    async fn upsert_presets(&self, presets: &[IdentifierPreset]) -> Result<(), StoreError> {
        check_presets(presets)?;
        self.state.lock().await.upsert_presets(presets);
        Ok(())
    }

    async fn upsert_app_mappings(&self, mappings: &[AppMapping]) -> Result<(), StoreError> {
        check_app_mappings(mappings)?;
        self.state.lock().await.upsert_app_mappings(mappings);
        Ok(())
    }

    async fn delete_presets(&self, identifiers: &[String]) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.delete_presets(identifiers))
    }

    async fn delete_app_mappings(&self, pkgs: &[String]) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.delete_app_mappings(pkgs))
    }

    async fn sync_config(&self) -> Result<Option<SyncConfig>, StoreError> {
        Ok(self.state.lock().await.config.clone())
    }

    async fn set_sync_config(&self, config: &SyncConfig) -> Result<(), StoreError> {
        self.state.lock().await.config = Some(config.clone());
        Ok(())
    }

    async fn apply_sync(
        &self,
        response: &SyncResponse,
        config: &SyncConfig,
    ) -> Result<(), StoreError> {
        check_presets(&response.changed_idents)?;
        check_app_mappings(&response.changed_apps)?;

        let mut state = self.state.lock().await;
        // Mutate a copy and commit it in one assignment.
        let mut next = state.clone();
        next.delete_presets(&response.deleted_idents);
        next.upsert_presets(&response.changed_idents);
        next.delete_app_mappings(&response.deleted_apps);
        next.upsert_app_mappings(&response.changed_apps);

        let mut config = config.clone();
        config.last_sync = response.sync_time;
        next.config = Some(config);

        *state = next;
        Ok(())
    }
}
