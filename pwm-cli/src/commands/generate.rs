//! Derive a password.

use anyhow::{Context as _, Result};
use clap::Args;
use pwm_core::{derive_preset, identifier_candidates};
use pwm_types::{AppMapping, IdentifierPreset};
use std::io::BufRead;
use zeroize::Zeroizing;

use super::Context;

/// Arguments of `pwm generate`.
#[derive(Args, Debug, Default, Clone)]
pub struct GenerateArgs {
    /// Identifier (usually a domain). Optional with --website or a mapped --app
    pub identifier: Option<String>,

    /// Iteration counter (overrides the stored preset)
    #[arg(long, short)]
    pub iter: Option<u32>,

    /// Symbol alphabet (overrides the stored preset)
    #[arg(long, short)]
    pub symbols: Option<String>,

    /// Short 12-character password
    #[arg(long, conflicts_with = "long")]
    pub short: bool,

    /// Long 24-character password
    #[arg(long)]
    pub long: bool,

    /// Save the parameters as a preset and sync
    #[arg(long)]
    pub save: bool,

    /// Application package; resolves the identifier via its app mapping
    #[arg(long, conflicts_with = "website")]
    pub app: Option<String>,

    /// Website host; the identifier becomes its registrable domain
    #[arg(long, conflicts_with = "identifier")]
    pub website: Option<String>,

    /// With --website, use the full host instead of the registrable domain
    #[arg(long, requires = "website")]
    pub full: bool,

    /// Read the master password from the first line of stdin
    #[arg(long)]
    pub master_stdin: bool,
}

/// Where the identifier came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Identifier to derive for.
    pub identifier: String,
    /// App mapping to record on save.
    pub new_mapping: Option<AppMapping>,
}

/// Run the generate command.
pub async fn run(ctx: &Context, args: &GenerateArgs) -> Result<()> {
    let target = resolve_target(ctx, args).await?;
    let preset = resolve_preset(ctx, &target.identifier, args).await?;
    let master = read_master(args.master_stdin)?;

    let password = derive(&master, &preset)?;
    println!("{}", password.as_str());

    if args.save && save(ctx, &target, &preset).await? {
        ctx.sync_after_save().await?;
    }
    Ok(())
}

/// Pick the identifier from the positional argument, `--website` or `--app`.
pub async fn resolve_target(ctx: &Context, args: &GenerateArgs) -> Result<Target> {
    if let Some(host) = &args.website {
        let index = usize::from(args.full);
        let identifier = identifier_candidates(host)
            .into_iter()
            .nth(index)
            .with_context(|| format!("{host:?} is not a website host"))?;
        return Ok(Target {
            identifier,
            new_mapping: None,
        });
    }

    let Some(pkg) = &args.app else {
        let identifier = args
            .identifier
            .clone()
            .filter(|id| !id.is_empty())
            .context("Pass an identifier, --website or --app")?;
        return Ok(Target {
            identifier,
            new_mapping: None,
        });
    };

    let mapped = ctx.store.app_mapping_for(pkg).await?;
    let identifier = match (&args.identifier, &mapped) {
        (Some(id), _) if !id.is_empty() => id.clone(),
        (_, Some(mapping)) => mapping.identifier.clone(),
        _ => anyhow::bail!("No identifier mapped to {pkg:?}; pass one to create the mapping"),
    };
    let new_mapping = match mapped {
        Some(mapping) if mapping.identifier == identifier => None,
        _ => Some(AppMapping::new(pkg.clone(), identifier.clone())),
    };
    Ok(Target {
        identifier,
        new_mapping,
    })
}

/// The stored preset for `identifier` (or the defaults) with command line
/// overrides applied.
pub async fn resolve_preset(
    ctx: &Context,
    identifier: &str,
    args: &GenerateArgs,
) -> Result<IdentifierPreset> {
    let mut preset = match ctx.store.preset_for(identifier).await? {
        Some(stored) => stored,
        None => IdentifierPreset::new(identifier, 0, ctx.config.default_symbols.clone(), true),
    };
    if let Some(iter) = args.iter {
        preset.iteration = iter;
    }
    if let Some(symbols) = &args.symbols {
        preset.symbols = symbols.clone();
    }
    if args.short {
        preset.long_mode = false;
    } else if args.long {
        preset.long_mode = true;
    }
    Ok(preset)
}

/// Derive the password for a preset.
pub fn derive(master: &str, preset: &IdentifierPreset) -> Result<Zeroizing<String>> {
    let password = derive_preset(master, preset).context("Symbol alphabet must not be empty")?;
    Ok(Zeroizing::new(password))
}

/// Persist a preset worth saving and any new app mapping.
///
/// Returns whether anything was written.
pub async fn save(ctx: &Context, target: &Target, preset: &IdentifierPreset) -> Result<bool> {
    let mut saved = false;
    if preset.is_worth_saving() {
        ctx.store.upsert_presets(std::slice::from_ref(preset)).await?;
        println!("Saved preset for {}", preset.identifier);
        saved = true;
    } else {
        tracing::debug!("default parameters for {}, nothing to save", preset.identifier);
    }
    if let Some(mapping) = &target.new_mapping {
        ctx.store
            .upsert_app_mappings(std::slice::from_ref(mapping))
            .await?;
        println!("Mapped {} to {}", mapping.pkg, mapping.identifier);
        saved = true;
    }
    Ok(saved)
}

fn read_master(from_stdin: bool) -> Result<Zeroizing<String>> {
    if !from_stdin {
        return rpassword::prompt_password("Master password: ")
            .map(Zeroizing::new)
            .context("Failed to read master password");
    }

    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read master password from stdin")?;
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}
