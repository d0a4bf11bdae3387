//! SQLite settings store.

use super::{check_app_mappings, check_presets, SettingStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use pwm_types::{instant, AppMapping, IdentifierPreset, SyncConfig, SyncResponse, Token};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use std::path::Path;
use std::str::FromStr;

/// Key of the single `sync_info` row.
const SYNC_INFO_KEY: i64 = 0;

/// SQLite-based settings store.
///
/// Uses WAL mode for concurrent reads/writes. Instants are stored as
/// ISO-8601 text in the same form as on the wire.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // One connection: every connection to ":memory:" is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ident_settings (
                ident TEXT PRIMARY KEY NOT NULL,
                iter INTEGER NOT NULL,
                symbols TEXT NOT NULL,
                longpw INTEGER NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS app_mappings (
                pkg TEXT PRIMARY KEY NOT NULL,
                ident TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_info (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                server_host TEXT NOT NULL,
                server_port INTEGER NOT NULL,
                token TEXT NOT NULL,
                auto_sync INTEGER NOT NULL,
                last_sync TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

async fn upsert_preset_rows(
    conn: &mut SqliteConnection,
    presets: &[IdentifierPreset],
) -> Result<(), StoreError> {
    let now = instant::format(&Utc::now());
    for preset in presets {
        sqlx::query(
            r#"
            INSERT INTO ident_settings (ident, iter, symbols, longpw, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(ident) DO UPDATE SET
                iter = excluded.iter,
                symbols = excluded.symbols,
                longpw = excluded.longpw,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&preset.identifier)
        .bind(i64::from(preset.iteration))
        .bind(&preset.symbols)
        .bind(preset.long_mode)
        .bind(&now)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn upsert_app_rows(
    conn: &mut SqliteConnection,
    mappings: &[AppMapping],
) -> Result<(), StoreError> {
    let now = instant::format(&Utc::now());
    for mapping in mappings {
        sqlx::query(
            r#"
            INSERT INTO app_mappings (pkg, ident, timestamp)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(pkg) DO UPDATE SET
                ident = excluded.ident,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&mapping.pkg)
        .bind(&mapping.identifier)
        .bind(&now)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn delete_rows(
    conn: &mut SqliteConnection,
    statement: &str,
    keys: &[String],
) -> Result<u64, StoreError> {
    let mut removed = 0;
    for key in keys {
        removed += sqlx::query(statement)
            .bind(key)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(removed)
}

const DELETE_PRESET: &str = "DELETE FROM ident_settings WHERE ident = ?1";
const DELETE_APP: &str = "DELETE FROM app_mappings WHERE pkg = ?1";

async fn write_sync_info(conn: &mut SqliteConnection, config: &SyncConfig) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO sync_info (id, server_host, server_port, token, auto_sync, last_sync)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            server_host = excluded.server_host,
            server_port = excluded.server_port,
            token = excluded.token,
            auto_sync = excluded.auto_sync,
            last_sync = excluded.last_sync
        "#,
    )
    .bind(SYNC_INFO_KEY)
    .bind(&config.server_host)
    .bind(i64::from(config.server_port))
    .bind(config.token.expose())
    .bind(config.auto_sync)
    .bind(instant::format(&config.last_sync))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl SettingStore for SqliteStore {
    async fn all_presets(&self) -> Result<Vec<IdentifierPreset>, StoreError> {
        let rows = sqlx::query_as::<_, PresetRow>(
            "SELECT ident, iter, symbols, longpw, timestamp FROM ident_settings ORDER BY ident",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn all_app_mappings(&self) -> Result<Vec<AppMapping>, StoreError> {
        let rows = sqlx::query_as::<_, AppRow>(
            "SELECT pkg, ident, timestamp FROM app_mappings ORDER BY pkg",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn preset_for(&self, identifier: &str) -> Result<Option<IdentifierPreset>, StoreError> {
        let row = sqlx::query_as::<_, PresetRow>(
            "SELECT ident, iter, symbols, longpw, timestamp FROM ident_settings WHERE ident = ?1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn app_mapping_for(&self, pkg: &str) -> Result<Option<AppMapping>, StoreError> {
        let row = sqlx::query_as::<_, AppRow>(
            "SELECT pkg, ident, timestamp FROM app_mappings WHERE pkg = ?1",
        )
        .bind(pkg)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn has_identifier(&self, identifier: &str) -> Result<u32, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ident_settings WHERE ident = ?1")
                .bind(identifier)
                .fetch_one(&self.pool)
                .await?;

        u32::try_from(count).map_err(|_| StoreError::Corrupt(format!("row count {count}")))
    }

    async fn upsert_presets(&self, presets: &[IdentifierPreset]) -> Result<(), StoreError> {
        check_presets(presets)?;
        let mut tx = self.pool.begin().await?;
        upsert_preset_rows(&mut tx, presets).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_app_mappings(&self, mappings: &[AppMapping]) -> Result<(), StoreError> {
        check_app_mappings(mappings)?;
        let mut tx = self.pool.begin().await?;
        upsert_app_rows(&mut tx, mappings).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_presets(&self, identifiers: &[String]) -> Result<u64, StoreError> {
        if identifiers.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let removed = delete_rows(&mut tx, DELETE_PRESET, identifiers).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_app_mappings(&self, pkgs: &[String]) -> Result<u64, StoreError> {
        if pkgs.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let removed = delete_rows(&mut tx, DELETE_APP, pkgs).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn sync_config(&self) -> Result<Option<SyncConfig>, StoreError> {
        let row = sqlx::query_as::<_, SyncInfoRow>(
            r#"
            SELECT server_host, server_port, token, auto_sync, last_sync
            FROM sync_info
            WHERE id = ?1
            "#,
        )
        .bind(SYNC_INFO_KEY)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn set_sync_config(&self, config: &SyncConfig) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        write_sync_info(&mut conn, config).await
    }

    async fn apply_sync(
        &self,
        response: &SyncResponse,
        config: &SyncConfig,
    ) -> Result<(), StoreError> {
        check_presets(&response.changed_idents)?;
        check_app_mappings(&response.changed_apps)?;

        let mut config = config.clone();
        config.last_sync = response.sync_time;

        // Dropping the transaction on any error rolls everything back.
        let mut tx = self.pool.begin().await?;
        delete_rows(&mut tx, DELETE_PRESET, &response.deleted_idents).await?;
        upsert_preset_rows(&mut tx, &response.changed_idents).await?;
        delete_rows(&mut tx, DELETE_APP, &response.deleted_apps).await?;
        upsert_app_rows(&mut tx, &response.changed_apps).await?;
        write_sync_info(&mut tx, &config).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Internal row types for SQLite queries.
#[derive(sqlx::FromRow)]
struct PresetRow {
    ident: String,
    iter: i64,
    symbols: String,
    longpw: bool,
    timestamp: String,
}

impl TryFrom<PresetRow> for IdentifierPreset {
    type Error = StoreError;

    fn try_from(row: PresetRow) -> Result<Self, Self::Error> {
        Ok(IdentifierPreset {
            iteration: u32::try_from(row.iter).map_err(|_| {
                StoreError::Corrupt(format!("iteration {} for {}", row.iter, row.ident))
            })?,
            timestamp: parse_instant(&row.timestamp)?,
            identifier: row.ident,
            symbols: row.symbols,
            long_mode: row.longpw,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AppRow {
    pkg: String,
    ident: String,
    timestamp: String,
}

impl TryFrom<AppRow> for AppMapping {
    type Error = StoreError;

    fn try_from(row: AppRow) -> Result<Self, Self::Error> {
        Ok(AppMapping {
            timestamp: parse_instant(&row.timestamp)?,
            pkg: row.pkg,
            identifier: row.ident,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SyncInfoRow {
    server_host: String,
    server_port: i64,
    token: String,
    auto_sync: bool,
    last_sync: String,
}

impl TryFrom<SyncInfoRow> for SyncConfig {
    type Error = StoreError;

    fn try_from(row: SyncInfoRow) -> Result<Self, Self::Error> {
        Ok(SyncConfig {
            server_port: u16::try_from(row.server_port)
                .map_err(|_| StoreError::Corrupt(format!("server port {}", row.server_port)))?,
            last_sync: parse_instant(&row.last_sync)?,
            server_host: row.server_host,
            token: Token::new(row.token),
            auto_sync: row.auto_sync,
        })
    }
}

fn parse_instant(raw: &str) -> Result<chrono::DateTime<Utc>, StoreError> {
    instant::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn upsert_stamps_now() {
        contract::upsert_stamps_now(&store().await).await;
    }

    #[tokio::test]
    async fn upsert_replaces() {
        contract::upsert_replaces(&store().await).await;
    }

    #[tokio::test]
    async fn rejects_empty_keys() {
        contract::rejects_empty_keys(&store().await).await;
    }

    #[tokio::test]
    async fn app_mappings_roundtrip() {
        contract::app_mappings_roundtrip(&store().await).await;
    }

    #[tokio::test]
    async fn delete_presets_counts() {
        contract::delete_presets_counts(&store().await).await;
    }

    #[tokio::test]
    async fn sync_config_roundtrip() {
        contract::sync_config_roundtrip(&store().await).await;
    }

    #[tokio::test]
    async fn apply_sync_merges() {
        contract::apply_sync_merges(&store().await).await;
    }

    #[tokio::test]
    async fn apply_sync_is_idempotent() {
        contract::apply_sync_is_idempotent(&store().await).await;
    }

    #[tokio::test]
    async fn apply_sync_rejects_whole_batch() {
        contract::apply_sync_rejects_whole_batch(&store().await).await;
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");

        {
            let store = SqliteStore::new(&path).await.unwrap();
            store
                .upsert_presets(&[IdentifierPreset::new("example.com", 4, "$", false)])
                .await
                .unwrap();
            store
                .set_sync_config(&SyncConfig::new("sync.example.com", 443, "tok"))
                .await
                .unwrap();
            store.pool.close().await;
        }

        let store = SqliteStore::new(&path).await.unwrap();
        let preset = store.preset_for("example.com").await.unwrap().unwrap();
        assert_eq!(preset.iteration, 4);
        assert_eq!(preset.symbols, "$");
        let config = store.sync_config().await.unwrap().unwrap();
        assert_eq!(config.token.expose(), "tok");
        assert!(!config.has_synced());
    }

    #[tokio::test]
    async fn corrupt_timestamp_is_reported() {
        let store = store().await;
        sqlx::query(
            "INSERT INTO ident_settings (ident, iter, symbols, longpw, timestamp) VALUES ('x.example', 1, '!', 1, 'garbage')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        assert!(matches!(
            store.all_presets().await,
            Err(StoreError::Corrupt(_))
        ));
    }
}
