//! List and edit identifier presets.

use anyhow::Result;
use pwm_types::IdentifierPreset;

use super::Context;

/// Run `preset list`.
pub async fn list(ctx: &Context) -> Result<()> {
    let presets = ctx.store.all_presets().await?;
    if presets.is_empty() {
        println!("No presets saved.");
        return Ok(());
    }
    for preset in &presets {
        println!("{}", describe(preset));
    }
    Ok(())
}

/// Run `preset set`: create or update the preset for `identifier`.
///
/// Unspecified parameters keep their stored value (or the default). With
/// `rename_from` the stored preset of that identifier is moved to
/// `identifier` first, so unspecified parameters come from it.
pub async fn set(
    ctx: &Context,
    identifier: &str,
    rename_from: Option<&str>,
    iter: Option<u32>,
    symbols: Option<&str>,
    long_mode: Option<bool>,
) -> Result<()> {
    if identifier.is_empty() {
        anyhow::bail!("Identifier must not be empty");
    }
    let renamed = rename_from.filter(|old| *old != identifier);
    if let Some(old) = renamed {
        if ctx.store.preset_for(old).await?.is_none() {
            anyhow::bail!("No preset saved for {old}");
        }
    }

    let mut preset = updated(ctx, renamed.unwrap_or(identifier), iter, symbols, long_mode).await?;
    if preset.symbols.is_empty() {
        anyhow::bail!("Symbol alphabet must not be empty");
    }
    preset.identifier = identifier.to_string();

    ctx.store.upsert_presets(&[preset.clone()]).await?;
    if let Some(old) = renamed {
        ctx.store.delete_presets(&[old.to_string()]).await?;
        println!("Renamed {old} to {identifier}");
    }
    println!("Saved {}", describe(&preset));
    ctx.sync_after_save().await
}

/// Run `preset remove`.
pub async fn remove(ctx: &Context, identifier: &str) -> Result<()> {
    if ctx.store.delete_presets(&[identifier.to_string()]).await? == 0 {
        anyhow::bail!("No preset saved for {identifier}");
    }
    println!("Removed preset for {identifier}");
    ctx.sync_after_save().await
}

async fn updated(
    ctx: &Context,
    identifier: &str,
    iter: Option<u32>,
    symbols: Option<&str>,
    long_mode: Option<bool>,
) -> Result<IdentifierPreset> {
    if identifier.is_empty() {
        anyhow::bail!("Identifier must not be empty");
    }
    let mut preset = ctx
        .store
        .preset_for(identifier)
        .await?
        .unwrap_or_else(|| {
            IdentifierPreset::new(identifier, 0, ctx.config.default_symbols.clone(), true)
        });
    preset.iteration = iter.unwrap_or(preset.iteration);
    if let Some(symbols) = symbols {
        preset.symbols = symbols.to_string();
    }
    preset.long_mode = long_mode.unwrap_or(preset.long_mode);
    Ok(preset)
}

fn describe(preset: &IdentifierPreset) -> String {
    format!(
        "{}  iter={}  {}  symbols={:?}",
        preset.identifier,
        preset.iteration,
        if preset.long_mode { "long" } else { "short" },
        preset.symbols
    )
}
