//! Show sync status.

use anyhow::Result;
use chrono::{DateTime, Utc};
use pwm_core::last_sync_label;
use pwm_types::SyncConfig;

use super::Context;

/// Run the status command.
pub async fn run(ctx: &Context) -> Result<()> {
    println!("=== pwm status ===");
    println!();

    let presets = ctx.store.all_presets().await?;
    let apps = ctx.store.all_app_mappings().await?;
    println!("Settings:");
    println!("  Presets:      {}", presets.len());
    println!("  App mappings: {}", apps.len());
    println!();

    match ctx.store.sync_config().await? {
        Some(config) if config.is_valid() => {
            println!("Sync:");
            println!("  Server:    {}:{}", config.server_host, config.server_port);
            println!("  Token:     {}", redact(config.token.expose()));
            println!("  Auto-sync: {}", if config.auto_sync { "on" } else { "off" });
            println!(
                "  Last sync: {}",
                last_sync_line(&config, ctx.status.was_last_sync_successful(), Utc::now())
            );
            if ctx.status.is_sync_in_progress() {
                println!("  Phase:     {}", ctx.status.phase());
            }
        }
        _ => {
            println!("Sync: NOT CONFIGURED");
            println!();
            println!("Run 'pwm sync config --host <host> --port <port>' to set up sync.");
        }
    }

    Ok(())
}

/// "3 days ago", "Never", or either with " (failed later)" appended when the
/// most recent attempt failed.
pub fn last_sync_line(config: &SyncConfig, last_successful: bool, now: DateTime<Utc>) -> String {
    let mut line = last_sync_label(config.last_sync, now);
    if !last_successful {
        line.push_str(" (failed later)");
    }
    line
}

fn redact(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}
