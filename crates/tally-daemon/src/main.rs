//! tally-daemon entry point.
//!
//! Thin: loads config, opens the store, starts the game runtime, wires
//! middleware, and serves HTTP. Route handlers live in `routes.rs`; shared
//! state types live in `state.rs`.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tally_config::{ConfigSurface, UnusedKeyPolicy};
use tally_daemon::{routes, state};
use tally_ledger::{GameStore, InMemoryStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated YAML layers, merged in order.
const ENV_CONFIG_PATHS: &str = "TALLY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/tally.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = tally_config::load_layered_yaml(&path_refs)?;
    let report = tally_config::report_unused_keys(
        ConfigSurface::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "config has keys the daemon never reads");
    }
    let cfg = loaded.typed()?;
    info!(config_hash = %loaded.config_hash, channel_id = cfg.game.channel_id, "config loaded");

    let secrets = tally_config::resolve_secrets(&cfg, false)?;
    let store: Arc<dyn GameStore> = match &secrets.database_url {
        Some(url) => {
            let pool = tally_db::connect(url).await?;
            tally_db::migrate(&pool).await?;
            Arc::new(tally_db::PgStore::new(pool))
        }
        None => {
            warn!(
                env = %secrets.database_url_env,
                "database url not set; game state lives in memory only"
            );
            Arc::new(InMemoryStore::new())
        }
    };

    let shared = Arc::new(
        state::AppState::start(store, state::runtime_options(&cfg))
            .await
            .context("game runtime failed to start")?,
    );

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    tally_runtime::spawn_store_probe(
        Arc::clone(&shared.runtime),
        Duration::from_millis(cfg.reconcile.store_probe_interval_ms),
    );

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = cfg.daemon_addr()?;
    info!("tally-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn config_paths_from_env() -> Vec<String> {
    let raw = std::env::var(ENV_CONFIG_PATHS).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(tower_http::cors::Any)
}
