//! Process entrypoint (spec §5, §10.4): wires the config, store, and adapters together,
//! spawns the hot poller, cold poller, stream ingester, memory watchdog, and liveness
//! surface, then blocks on a shared shutdown signal and joins every task for a graceful
//! exit. Exit code 0 on a clean shutdown, 1 on a fatal startup error.

use std::sync::Arc;
use uuid::Uuid;

use traderwatch_backend::config::Config;
use traderwatch_backend::downstream::DownstreamClient;
use traderwatch_backend::poller::{cold, hot, Orchestrator};
use traderwatch_backend::ratelimit::{TokenBucket, WalletCooldown};
use traderwatch_backend::shutdown;
use traderwatch_backend::store::Store;
use traderwatch_backend::stream::{memory_watchdog, Ingester};
use traderwatch_backend::upstream::http::HttpUpstreamClient;
use traderwatch_backend::upstream::ws::ActivityFeedClient;
use traderwatch_backend::upstream::UpstreamClient;
use traderwatch_backend::{liveness, telemetry};

#[tokio::main]
async fn main() {
    telemetry::init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let store = Arc::new(Store::open(&config.database_path)?);
    let upstream = Arc::new(HttpUpstreamClient::new(
        config.upstream_http_base.clone(),
        config.market_status_api_key.clone(),
    )?);
    let downstream = Arc::new(DownstreamClient::new(
        config.downstream_base.clone(),
        config.downstream_bearer.clone(),
    )?);
    let activity_feed = Arc::new(ActivityFeedClient::new(config.upstream_ws_url.clone()));

    let (shutdown_handle, shutdown) = shutdown::channel();

    let upstream_dyn: Arc<dyn UpstreamClient> = upstream;
    let hot_orchestrator = Orchestrator {
        store: Arc::clone(&store),
        upstream: Arc::clone(&upstream_dyn),
        rate_limiter: TokenBucket::new(config.hot_rate_per_sec, config.hot_rate_burst),
        cooldown: WalletCooldown::new(config.hot_wallet_cooldown),
    };
    let cold_orchestrator = Orchestrator {
        store: Arc::clone(&store),
        upstream: Arc::clone(&upstream_dyn),
        rate_limiter: TokenBucket::new(config.cold_rate_per_sec, config.cold_rate_burst),
        cooldown: WalletCooldown::new(config.cold_wallet_cooldown),
    };

    let holder_id = cold_holder_id();

    let hot_task = tokio::spawn(hot::run(
        hot_orchestrator,
        config.hot_poll_interval,
        config.hot_error_budget,
        shutdown.clone(),
    ));

    let cold_task = tokio::spawn(cold::run(
        cold_orchestrator,
        config.cold_lock_name.clone(),
        chrono::Duration::from_std(config.cold_lock_duration).unwrap_or(chrono::Duration::minutes(65)),
        config.cold_poll_interval,
        config.cold_lock_extend_every,
        holder_id,
        shutdown.clone(),
    ));

    let ingester = Arc::new(Ingester::new(
        Arc::clone(&store),
        Arc::clone(&downstream),
        Arc::clone(&activity_feed),
        &config,
    ));
    let stream_task = tokio::spawn(Arc::clone(&ingester).run(shutdown.clone()));

    let watchdog_task = tokio::spawn(memory_watchdog::run(
        config.memory_watchdog_interval,
        config.memory_watchdog_threshold,
        shutdown.clone(),
    ));

    let liveness_task = tokio::spawn(liveness::serve(config.liveness_port, shutdown.clone()));

    shutdown_handle.listen_for_signals().await;

    let _ = tokio::join!(hot_task, cold_task, stream_task, watchdog_task, liveness_task);

    tracing::info!("shutdown complete");
    Ok(())
}

/// Identifies this process as a cold-lock holder; unique per run so a crashed replica
/// never collides with a fresh one racing to reacquire the same named lock.
fn cold_holder_id() -> String {
    format!(
        "{}-{}",
        hostname_or_unknown(),
        Uuid::new_v4()
    )
}

fn hostname_or_unknown() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}
