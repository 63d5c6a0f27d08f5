//! satcheld entry point.
//!
//! Boots the worker runtime from configuration, runs the precache
//! install/activate lifecycle against the configured manifest, then
//! serves the control channel as JSON lines on stdin. Logging goes to
//! stderr so stdin/stdout stay free for the control protocol.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use satchel_core::{AppConfig, CacheStore, PrecacheManifest};
use satchel_worker::fetch::{FetchConfig, ReqwestBackend};
use satchel_worker::routes::{platform_namespaces, platform_rules};
use satchel_worker::{ControlMessage, SystemClock, Worker};
use tracing_subscriber::EnvFilter;
use url::Url;

mod adapter;

/// Offline cache worker daemon for the satchel client.
#[derive(Debug, Parser)]
#[command(name = "satcheld", version, about = "satchel offline cache worker")]
struct Args {
    /// Print the JSON Schema of the control message union and exit.
    #[arg(long)]
    control_schema: bool,

    /// After install, wait for a SKIP_WAITING control message instead of
    /// activating immediately.
    #[arg(long)]
    hold: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.control_schema {
        let schema = schemars::schema_for!(ControlMessage);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    tracing::info!(db_path = %config.db_path.display(), "starting satcheld");

    let store = CacheStore::open(&config.db_path)
        .await
        .context("failed to open cache store")?;

    let fetch_config = FetchConfig {
        user_agent: config.user_agent.clone(),
        timeout: config.timeout(),
        max_redirects: config.max_redirects,
    };
    let backend = Arc::new(ReqwestBackend::new(&fetch_config)?);
    let base = Url::parse(&config.app_origin).context("invalid app_origin")?;

    let worker = Worker::new(
        store,
        platform_rules(),
        platform_namespaces(),
        backend,
        Arc::new(SystemClock),
        base,
    )
    .with_precache_concurrency(config.precache_concurrency);

    if let Some(manifest_path) = &config.manifest_path {
        let json = std::fs::read_to_string(manifest_path)
            .with_context(|| format!("failed to read manifest {}", manifest_path.display()))?;
        let manifest = PrecacheManifest::from_json(&json)?;

        let staged = worker.install(manifest).await.context("precache install failed")?;
        tracing::info!(assets = staged, "precache installed");

        if args.hold {
            tracing::info!("holding for SKIP_WAITING before activation");
        } else {
            let purged = worker.activate().await?;
            tracing::info!(purged, "worker active");
        }
    }

    adapter::run(&worker, tokio::io::stdin()).await?;

    Ok(())
}
