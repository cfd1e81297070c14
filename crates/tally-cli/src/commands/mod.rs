//! Command handler modules for tally-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod game;

use anyhow::{bail, Context, Result};
use sqlx::PgPool;
use tally_config::{report_unused_keys, ConfigSurface, TallyConfig, UnusedKeyPolicy};

/// Load `--config` layers (if any) for the CLI surface. Unused keys are
/// reported on stderr, never fatal.
pub fn load_config(config_paths: &[String]) -> Result<Option<TallyConfig>> {
    if config_paths.is_empty() {
        return Ok(None);
    }
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = tally_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(ConfigSurface::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS surface={} unused_leaf_keys={}",
            report.surface,
            report.unused_leaf_pointers.len()
        );
    }
    Ok(Some(loaded.typed()?))
}

/// Connect using the env var named in config, or TALLY_DATABASE_URL without one.
pub async fn connect(cfg: Option<&TallyConfig>) -> Result<PgPool> {
    let Some(cfg) = cfg else {
        return tally_db::connect_from_env().await;
    };
    let secrets = tally_config::resolve_secrets(cfg, true)?;
    let Some(url) = secrets.database_url else {
        bail!("SECRETS_MISSING: {} is not set", secrets.database_url_env);
    };
    tally_db::connect(&url)
        .await
        .with_context(|| format!("connect via {}", secrets.database_url_env))
}
