use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_DATABASE_URL_ENV: &str = "TALLY_DATABASE_URL";
pub const DEFAULT_DAEMON_ADDR: &str = "127.0.0.1:8898";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyConfig {
    pub game: GameConfig,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// The counting channel. Events for any other channel are ignored.
    pub channel_id: u64,
}

/// A missing role id disables that role's reconciliation. A missing penalty
/// role also disables penalty designation in the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub penalty_role_id: Option<u64>,
    #[serde(default)]
    pub reliable_role_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_quiet_delay_ms")]
    pub quiet_delay_ms: u64,
    #[serde(default = "default_store_probe_interval_ms")]
    pub store_probe_interval_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            quiet_delay_ms: default_quiet_delay_ms(),
            store_probe_interval_ms: default_store_probe_interval_ms(),
        }
    }
}

fn default_quiet_delay_ms() -> u64 {
    5_000
}

fn default_store_probe_interval_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Name of the env var holding the database URL.
    #[serde(default = "default_database_url_env")]
    pub database_url_env: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url_env: default_database_url_env(),
        }
    }
}

fn default_database_url_env() -> String {
    DEFAULT_DATABASE_URL_ENV.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_addr")]
    pub addr: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: default_daemon_addr(),
        }
    }
}

fn default_daemon_addr() -> String {
    DEFAULT_DAEMON_ADDR.to_string()
}

impl TallyConfig {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let cfg: TallyConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.game.channel_id == 0 {
            bail!("CONFIG_INVALID: /game/channel_id must be non-zero");
        }
        if self.reconcile.quiet_delay_ms == 0 {
            bail!("CONFIG_INVALID: /reconcile/quiet_delay_ms must be positive");
        }
        if self.reconcile.store_probe_interval_ms == 0 {
            bail!("CONFIG_INVALID: /reconcile/store_probe_interval_ms must be positive");
        }
        if self.store.database_url_env.trim().is_empty() {
            bail!("CONFIG_INVALID: /store/database_url_env must name an env var");
        }
        self.daemon_addr()?;
        Ok(())
    }

    pub fn daemon_addr(&self) -> Result<SocketAddr> {
        self.daemon
            .addr
            .parse()
            .with_context(|| format!("CONFIG_INVALID: /daemon/addr '{}'", self.daemon.addr))
    }

    pub fn penalty_enabled(&self) -> bool {
        self.roles.penalty_role_id.is_some()
    }

    pub fn reliable_enabled(&self) -> bool {
        self.roles.reliable_role_id.is_some()
    }
}
