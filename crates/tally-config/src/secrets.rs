//! Runtime secret resolution.
//!
//! Config stores env var NAMES only. Callers invoke [`resolve_secrets`] once
//! at startup and pass the result to constructors. Error messages name the
//! env var, never its value, and `Debug` redacts values.

use anyhow::{bail, Result};

use crate::TallyConfig;

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Name of the env var the URL was read from.
    pub database_url_env: String,
    /// `None` if the env var was absent or blank.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url_env", &self.database_url_env)
            .field("database_url", &self.database_url.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// With `require_database`, a missing URL is `SECRETS_MISSING`.
pub fn resolve_secrets(cfg: &TallyConfig, require_database: bool) -> Result<ResolvedSecrets> {
    let var = cfg.store.database_url_env.trim().to_string();
    let database_url = resolve_env(&var);
    if require_database && database_url.is_none() {
        bail!("SECRETS_MISSING: required env var '{var}' (database url) is not set or empty");
    }
    Ok(ResolvedSecrets {
        database_url_env: var,
        database_url,
    })
}
