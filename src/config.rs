//! Process configuration (spec §9 "Global state", §10.1).
//!
//! A single value, constructed once via [`Config::from_env`] and threaded explicitly into
//! every orchestrator constructor. Never read as a process-wide global: this keeps the
//! reconciler and the orchestrators unit-testable against synthetic adapters.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL for the upstream trade/position HTTP venue.
    pub upstream_http_base: String,
    /// WebSocket URL for the upstream activity feed.
    pub upstream_ws_url: String,
    /// Base URL for this system's own downstream control plane.
    pub downstream_base: String,
    /// Bearer secret presented to the downstream control plane.
    pub downstream_bearer: String,
    /// Optional API key for the authoritative market-status lookup.
    pub market_status_api_key: Option<String>,
    /// Path to the sqlite database file.
    pub database_path: String,
    /// Port the liveness endpoint binds to.
    pub liveness_port: u16,

    pub hot_poll_interval: Duration,
    pub cold_poll_interval: Duration,

    pub hot_rate_per_sec: f64,
    pub hot_rate_burst: f64,
    pub cold_rate_per_sec: f64,
    pub cold_rate_burst: f64,

    pub hot_wallet_cooldown: Duration,
    pub cold_wallet_cooldown: Duration,

    pub cold_lock_name: String,
    pub cold_lock_duration: Duration,
    pub cold_lock_extend_every: u32,

    /// Non-retryable errors tolerated within one hot-poller cycle before the process exits (§4.9).
    pub hot_error_budget: u32,

    /// Stream ingester batch buffer (§4.11): flush at this many buffered trades...
    pub stream_flush_size: usize,
    /// ...or after this much time since the last flush, whichever comes first.
    pub stream_flush_interval: Duration,
    /// How often the follow/target set snapshot is refreshed from the store and the
    /// downstream control plane.
    pub stream_follow_set_refresh_interval: Duration,
    /// How often stale entries are purged from the pending-orders fill-correlation cache.
    pub stream_pending_orders_refresh_interval: Duration,
    /// Max age of an entry in the pending-orders cache before it is considered stale.
    pub stream_pending_order_ttl: Duration,
    /// Max number of concurrently in-flight execution dispatches; additional admits are dropped.
    pub stream_max_in_flight_executions: usize,
    /// Consecutive-failure threshold before the execution-dispatch circuit breaker opens.
    pub stream_breaker_failure_threshold: u32,
    /// How long the execution-dispatch breaker stays open before probing again.
    pub stream_breaker_open_duration: Duration,
    /// How often the memory watchdog samples RSS.
    pub memory_watchdog_interval: Duration,
    /// Fraction of total system memory above which the watchdog logs a warning.
    pub memory_watchdog_threshold: f64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let upstream_http_base = env_required("UPSTREAM_HTTP_BASE")?;
        let upstream_ws_url = env_required("UPSTREAM_WS_URL")?;
        let downstream_base = env_required("DOWNSTREAM_BASE_URL")?;
        let downstream_bearer = env_required("DOWNSTREAM_BEARER_SECRET")?;
        let market_status_api_key = std::env::var("MARKET_STATUS_API_KEY").ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./traderwatch.db".to_string());

        let liveness_port = env_parsed_or("LIVENESS_PORT", 8080u16);

        let hot_poll_interval = Duration::from_secs(env_parsed_or("HOT_POLL_INTERVAL_SECS", 2));
        let cold_poll_interval =
            Duration::from_secs(env_parsed_or("COLD_POLL_INTERVAL_SECS", 3600));

        let hot_rate_per_sec = env_parsed_or("HOT_RATE_PER_SEC", 10.0);
        let hot_rate_burst = env_parsed_or("HOT_RATE_BURST", 20.0);
        let cold_rate_per_sec = env_parsed_or("COLD_RATE_PER_SEC", 5.0);
        let cold_rate_burst = env_parsed_or("COLD_RATE_BURST", 10.0);

        let hot_wallet_cooldown =
            Duration::from_secs(env_parsed_or("HOT_WALLET_COOLDOWN_SECS", 1));
        let cold_wallet_cooldown =
            Duration::from_secs(env_parsed_or("COLD_WALLET_COOLDOWN_SECS", 5));

        let cold_lock_name =
            std::env::var("COLD_LOCK_NAME").unwrap_or_else(|_| "cold_poll".to_string());
        let cold_lock_duration =
            Duration::from_secs(env_parsed_or("COLD_LOCK_DURATION_SECS", 65 * 60));
        let cold_lock_extend_every = env_parsed_or("COLD_LOCK_EXTEND_EVERY_N_WALLETS", 100);

        let hot_error_budget = env_parsed_or("HOT_ERROR_BUDGET", 50);

        let stream_flush_size = env_parsed_or("STREAM_FLUSH_SIZE", 50);
        let stream_flush_interval =
            Duration::from_millis(env_parsed_or("STREAM_FLUSH_INTERVAL_MS", 2000));
        let stream_follow_set_refresh_interval =
            Duration::from_secs(env_parsed_or("STREAM_FOLLOW_SET_REFRESH_SECS", 5 * 60));
        let stream_pending_orders_refresh_interval =
            Duration::from_secs(env_parsed_or("STREAM_PENDING_ORDERS_REFRESH_SECS", 60));
        let stream_pending_order_ttl =
            Duration::from_secs(env_parsed_or("STREAM_PENDING_ORDER_TTL_SECS", 10 * 60));
        let stream_max_in_flight_executions = env_parsed_or("STREAM_MAX_IN_FLIGHT_EXECUTIONS", 20);
        let stream_breaker_failure_threshold = env_parsed_or("STREAM_BREAKER_FAILURE_THRESHOLD", 5);
        let stream_breaker_open_duration =
            Duration::from_secs(env_parsed_or("STREAM_BREAKER_OPEN_DURATION_SECS", 60));
        let memory_watchdog_interval =
            Duration::from_secs(env_parsed_or("MEMORY_WATCHDOG_INTERVAL_SECS", 60));
        let memory_watchdog_threshold = env_parsed_or("MEMORY_WATCHDOG_THRESHOLD", 0.85);

        Ok(Self {
            upstream_http_base,
            upstream_ws_url,
            downstream_base,
            downstream_bearer,
            market_status_api_key,
            database_path,
            liveness_port,
            hot_poll_interval,
            cold_poll_interval,
            hot_rate_per_sec,
            hot_rate_burst,
            cold_rate_per_sec,
            cold_rate_burst,
            hot_wallet_cooldown,
            cold_wallet_cooldown,
            cold_lock_name,
            cold_lock_duration,
            cold_lock_extend_every,
            hot_error_budget,
            stream_flush_size,
            stream_flush_interval,
            stream_follow_set_refresh_interval,
            stream_pending_orders_refresh_interval,
            stream_pending_order_ttl,
            stream_max_in_flight_executions,
            stream_breaker_failure_threshold,
            stream_breaker_open_duration,
            memory_watchdog_interval,
            memory_watchdog_threshold,
        })
    }
}

fn env_required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("missing required environment variable {name}"))
}

fn env_parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
