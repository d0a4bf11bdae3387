//! List and edit app mappings.

use anyhow::Result;
use pwm_types::AppMapping;

use super::Context;

/// Run `app list`.
pub async fn list(ctx: &Context) -> Result<()> {
    let mappings = ctx.store.all_app_mappings().await?;
    if mappings.is_empty() {
        println!("No app mappings saved.");
    }
    for mapping in &mappings {
        println!("{} -> {}", mapping.pkg, mapping.identifier);
    }
    Ok(())
}

/// Run `app map`: bind `pkg` to `identifier`.
///
/// With `rename_from` the mapping stored under that package moves to `pkg`.
pub async fn map(
    ctx: &Context,
    pkg: &str,
    identifier: &str,
    rename_from: Option<&str>,
) -> Result<()> {
    if pkg.is_empty() || identifier.is_empty() {
        anyhow::bail!("Package and identifier must not be empty");
    }
    let renamed = rename_from.filter(|old| *old != pkg);
    if let Some(old) = renamed {
        if ctx.store.app_mapping_for(old).await?.is_none() {
            anyhow::bail!("No mapping saved for {old}");
        }
    }

    ctx.store
        .upsert_app_mappings(&[AppMapping::new(pkg, identifier)])
        .await?;
    if let Some(old) = renamed {
        ctx.store.delete_app_mappings(&[old.to_string()]).await?;
        println!("Renamed {old} to {pkg}");
    }
    if ctx.store.has_identifier(identifier).await? == 0 {
        println!("Note: {identifier} has no preset; the defaults apply");
    }
    println!("Mapped {pkg} to {identifier}");
    ctx.sync_after_save().await
}

/// Run `app remove`.
pub async fn remove(ctx: &Context, pkg: &str) -> Result<()> {
    if ctx.store.delete_app_mappings(&[pkg.to_string()]).await? == 0 {
        anyhow::bail!("No mapping saved for {pkg}");
    }
    println!("Removed mapping for {pkg}");
    ctx.sync_after_save().await
}
