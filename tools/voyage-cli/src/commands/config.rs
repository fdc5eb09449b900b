//! Configuration management commands.

use anyhow::{bail, Result};
use dialoguer::Confirm;

use super::{ConfigArgs, ConfigCommand};
use crate::config::CliConfig;
use crate::context::{Context, CONFIG_NAMES};
use crate::output::format_millis;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Init { force } => init_config(force, ctx).await,
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Path => config_path(ctx).await,
    }
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx
        .config_path
        .clone()
        .unwrap_or_else(|| ctx.cwd.join(CONFIG_NAMES[0]));

    if config_path.exists() && !force {
        if ctx.output.is_json() || !console::user_attended() {
            bail!(
                "Config file already exists: {}. Use --force to overwrite.",
                config_path.display()
            );
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Overwrite {}?", config_path.display()))
            .default(false)
            .interact()?;
        if !confirmed {
            ctx.output.warn("Left existing config untouched");
            return Ok(());
        }
    }

    CliConfig::default().save(&config_path.to_string_lossy())?;
    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    let config = &ctx.config;
    ctx.output.header("Current Configuration");

    ctx.output.info("[service]");
    ctx.output.kv("base_url", &config.service.base_url);
    ctx.output.kv("token", if config.service.token.is_some() { "(set)" } else { "(none)" });
    ctx.output.kv("connect timeout", &format_millis(config.service.timeouts.connect_ms));
    ctx.output.kv("total timeout", &format_millis(config.service.timeouts.total_ms));

    ctx.output.info("[staleness]");
    let staleness = &config.staleness;
    for (name, ms) in [
        ("reference", staleness.reference_ms),
        ("listing", staleness.listing_ms),
        ("detail", staleness.detail_ms),
        ("featured", staleness.featured_ms),
        ("reviews", staleness.reviews_ms),
        ("search", staleness.search_ms),
        ("fallback", staleness.fallback_ms),
    ] {
        ctx.output.kv(name, &format_millis(ms));
    }

    ctx.output.info("[search]");
    ctx.output.kv("debounce", &format_millis(config.search.debounce_ms));
    ctx.output.kv("min_query_len", &config.search.min_query_len.to_string());
    ctx.output.kv("max_query_len", &config.search.max_query_len.to_string());

    ctx.output.info("[logging]");
    ctx.output.kv("level", &config.logging.level.to_string());
    ctx.output.kv("format", &format!("{:?}", config.logging.format).to_lowercase());

    Ok(())
}

async fn config_path(ctx: &Context) -> Result<()> {
    let path = ctx.config_path.as_ref().map(|p| p.display().to_string());

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "path": path }));
    } else {
        match path {
            Some(path) => println!("{}", path),
            None => ctx.output.info("No config file found; using defaults"),
        }
    }

    Ok(())
}
