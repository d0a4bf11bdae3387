//! Configure and run preset sync.

use anyhow::{Context as _, Result};
use pwm_types::{instant, SyncConfig, Token};

use super::Context;

/// Run `sync config`: save the server settings.
///
/// With `verify` the server must answer a ping before anything is stored.
/// A fresh save starts from a never-synced state, except that the last sync
/// instant is kept when host, port and token are all unchanged.
pub async fn configure(
    ctx: &Context,
    host: &str,
    port: u16,
    token: Option<String>,
    auto_sync: bool,
    verify: bool,
) -> Result<()> {
    let token = match token {
        Some(token) => Token::new(token),
        None => Token::new(rpassword::prompt_password("Sync token: ").context("Failed to read token")?),
    };
    let mut config = SyncConfig::new(host, port, token).with_auto_sync(auto_sync);
    if !config.is_valid() {
        anyhow::bail!("Host, port and token are all required");
    }

    if verify {
        ctx.client()?
            .probe(&config)
            .await
            .with_context(|| format!("Connection to {host}:{port} failed; settings not saved"))?;
    }

    if let Some(previous) = ctx.store.sync_config().await? {
        if same_server(&previous, &config) {
            config.last_sync = previous.last_sync;
        }
    }
    ctx.store.set_sync_config(&config).await?;

    println!(
        "Sync server set to {}:{} (auto-sync {})",
        config.server_host,
        config.server_port,
        if config.auto_sync { "on" } else { "off" }
    );
    Ok(())
}

/// Run `sync auto`: switch auto-sync without touching the server settings.
pub async fn set_auto(ctx: &Context, enabled: bool) -> Result<()> {
    let mut config = configured(ctx).await?;
    config.auto_sync = enabled;
    ctx.store.set_sync_config(&config).await?;
    println!("Auto-sync {}", if enabled { "on" } else { "off" });
    Ok(())
}

/// Run `sync remove`: forget the server.
///
/// The token and the auto-sync flag stay; host, port and the last sync
/// instant are cleared.
pub async fn remove(ctx: &Context) -> Result<()> {
    let previous = configured(ctx).await?;
    let cleared = SyncConfig {
        token: previous.token,
        auto_sync: previous.auto_sync,
        ..SyncConfig::default()
    };
    ctx.store.set_sync_config(&cleared).await?;
    println!("Sync server removed");
    Ok(())
}

/// Run `sync test`: probe the configured server.
pub async fn test(ctx: &Context) -> Result<()> {
    let config = configured(ctx).await?;
    ctx.client()?
        .probe(&config)
        .await
        .with_context(|| format!("Connection to {}:{} failed", config.server_host, config.server_port))?;
    println!("Connection OK");
    Ok(())
}

/// Run `sync now`.
pub async fn now(ctx: &Context, auto_only: bool) -> Result<()> {
    let report = ctx.client()?.run(auto_only).await.context("Sync failed")?;
    println!(
        "Synced at {}: {} presets changed, {} deleted; {} app mappings changed, {} deleted",
        instant::format(&report.sync_time),
        report.changed_idents,
        report.deleted_idents,
        report.changed_apps,
        report.deleted_apps
    );
    Ok(())
}

async fn configured(ctx: &Context) -> Result<SyncConfig> {
    ctx.store
        .sync_config()
        .await?
        .filter(SyncConfig::is_valid)
        .context("Sync is not configured. Run 'pwm sync config' first.")
}

fn same_server(a: &SyncConfig, b: &SyncConfig) -> bool {
    a.server_host == b.server_host && a.server_port == b.server_port && a.token == b.token
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::context;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn configure_saves_config() {
        let (_dir, ctx) = context().await;
        configure(&ctx, "sync.example.com", 8443, Some("tok".into()), false, false)
            .await
            .unwrap();

        let config = ctx.store.sync_config().await.unwrap().unwrap();
        assert_eq!(config.server_host, "sync.example.com");
        assert_eq!(config.server_port, 8443);
        assert_eq!(config.token.expose(), "tok");
        assert!(!config.auto_sync);
        assert!(!config.has_synced());
    }

    #[tokio::test]
    async fn configure_rejects_incomplete_settings() {
        let (_dir, ctx) = context().await;
        assert!(configure(&ctx, "", 8443, Some("tok".into()), true, false).await.is_err());
        assert!(configure(&ctx, "sync.example.com", 0, Some("tok".into()), true, false)
            .await
            .is_err());
        assert!(ctx.store.sync_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_sync_survives_only_for_same_server() {
        let (_dir, ctx) = context().await;
        let mut config = SyncConfig::new("sync.example.com", 8443, "tok");
        config.last_sync = instant::parse("2024-03-01T00:00:00Z").unwrap();
        ctx.store.set_sync_config(&config).await.unwrap();

        configure(&ctx, "sync.example.com", 8443, Some("tok".into()), false, false)
            .await
            .unwrap();
        assert!(ctx.store.sync_config().await.unwrap().unwrap().has_synced());

        configure(&ctx, "other.example.com", 8443, Some("tok".into()), true, false)
            .await
            .unwrap();
        assert!(!ctx.store.sync_config().await.unwrap().unwrap().has_synced());
    }

    #[tokio::test]
    async fn test_and_now_need_config() {
        let (_dir, ctx) = context().await;
        assert!(test(&ctx).await.is_err());
        assert!(now(&ctx, false).await.is_err());
        assert!(!ctx.status.is_sync_in_progress());
    }

    #[tokio::test]
    async fn now_fails_on_unreachable_server() {
        let (_dir, ctx) = context().await;
        configure(&ctx, "127.0.0.1", 1, Some("tok".into()), true, false)
            .await
            .unwrap();

        assert!(now(&ctx, false).await.is_err());
        assert!(!ctx.status.was_last_sync_successful());
    }

    // ===========================================
    // Verified configuration
    // ===========================================

    #[tokio::test]
    async fn unreachable_server_is_not_saved() {
        let (_dir, ctx) = context().await;
        let previous = SyncConfig::new("sync.example.com", 8443, "tok");
        ctx.store.set_sync_config(&previous).await.unwrap();

        assert!(configure(&ctx, "127.0.0.1", 1, Some("new-tok".into()), true, true)
            .await
            .is_err());
        assert_eq!(ctx.store.sync_config().await.unwrap(), Some(previous));
    }

    #[tokio::test]
    async fn answering_server_is_saved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pwm_sync_version": 1 })))
            .expect(1)
            .mount(&server)
            .await;
        let (_dir, mut ctx) = context().await;
        ctx.config.scheme = "http".into();

        let addr = server.address();
        configure(&ctx, &addr.ip().to_string(), addr.port(), Some("tok".into()), true, true)
            .await
            .unwrap();
        let config = ctx.store.sync_config().await.unwrap().unwrap();
        assert_eq!(config.server_port, addr.port());
    }

    #[tokio::test]
    async fn unsupported_server_version_is_not_saved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pwm_sync_version": 2 })))
            .mount(&server)
            .await;
        let (_dir, mut ctx) = context().await;
        ctx.config.scheme = "http".into();

        let addr = server.address();
        assert!(configure(&ctx, &addr.ip().to_string(), addr.port(), Some("tok".into()), true, true)
            .await
            .is_err());
        assert!(ctx.store.sync_config().await.unwrap().is_none());
    }

    // ===========================================
    // Auto-sync switch and removal
    // ===========================================

    #[tokio::test]
    async fn set_auto_only_flips_the_flag() {
        let (_dir, ctx) = context().await;
        assert!(set_auto(&ctx, false).await.is_err());

        let mut config = SyncConfig::new("sync.example.com", 8443, "tok");
        config.last_sync = instant::parse("2024-03-01T00:00:00Z").unwrap();
        ctx.store.set_sync_config(&config).await.unwrap();

        set_auto(&ctx, false).await.unwrap();
        let stored = ctx.store.sync_config().await.unwrap().unwrap();
        assert!(!stored.auto_sync);
        assert_eq!(stored.server_host, "sync.example.com");
        assert_eq!(stored.server_port, 8443);
        assert_eq!(stored.token.expose(), "tok");
        assert_eq!(stored.last_sync, config.last_sync);

        set_auto(&ctx, true).await.unwrap();
        assert!(ctx.store.sync_config().await.unwrap().unwrap().auto_sync);
    }

    #[tokio::test]
    async fn remove_keeps_token_and_auto_flag() {
        let (_dir, ctx) = context().await;
        assert!(remove(&ctx).await.is_err());

        let mut config = SyncConfig::new("sync.example.com", 8443, "tok").with_auto_sync(false);
        config.last_sync = instant::parse("2024-03-01T00:00:00Z").unwrap();
        ctx.store.set_sync_config(&config).await.unwrap();

        remove(&ctx).await.unwrap();
        let stored = ctx.store.sync_config().await.unwrap().unwrap();
        assert_eq!(stored.token.expose(), "tok");
        assert!(!stored.auto_sync);
        assert!(stored.server_host.is_empty());
        assert_eq!(stored.server_port, 0);
        assert!(!stored.has_synced());
        assert!(!stored.is_valid());

        // A removed server counts as unconfigured everywhere.
        assert!(remove(&ctx).await.is_err());
        assert!(set_auto(&ctx, true).await.is_err());
        assert!(test(&ctx).await.is_err());
    }
}
