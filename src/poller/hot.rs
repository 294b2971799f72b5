//! Hot poller (spec §4.9): sequential per-wallet cycles over the active follow set,
//! every few seconds, with a per-cycle non-timeout error budget that crashes the
//! process (so the supervisor restarts it) when exhausted.

use std::time::{Duration, Instant};

use crate::poller::Orchestrator;
use crate::shutdown::Shutdown;

pub async fn run(orchestrator: Orchestrator, interval: Duration, error_budget: u32, shutdown: Shutdown) {
    loop {
        if shutdown.is_triggered() {
            tracing::info!("hot poller exiting cleanly on shutdown signal");
            return;
        }

        let cycle_start = Instant::now();
        let hot_set = match orchestrator.store.get_active_follows() {
            Ok(set) => set,
            Err(e) => {
                tracing::error!(error = %e, "failed to load active follow set; skipping cycle");
                Vec::new()
            }
        };

        if hot_set.is_empty() {
            sleep_or_shutdown(interval, &shutdown).await;
            continue;
        }

        // Error budget resets at the start of each cycle (spec §4.9).
        let mut non_timeout_errors = 0u32;

        for wallet in &hot_set {
            if shutdown.is_triggered() {
                break;
            }
            if let Err(e) = orchestrator.run_cycle(wallet).await {
                tracing::warn!(%wallet, error = %e, "hot poll cycle failed for wallet");
                // Timeouts are tolerated up to a generous threshold and never count
                // toward the error budget (spec §4.9); only non-timeout failures do.
                if e.is_timeout() {
                    continue;
                }
                non_timeout_errors += 1;
                if non_timeout_errors >= error_budget {
                    tracing::error!(
                        non_timeout_errors,
                        error_budget,
                        "hot poller error budget exhausted; exiting for supervisor restart"
                    );
                    std::process::exit(1);
                }
            }
        }

        let elapsed = cycle_start.elapsed();
        let remaining = interval.checked_sub(elapsed).unwrap_or(Duration::ZERO);
        sleep_or_shutdown(remaining, &shutdown).await;
    }
}

async fn sleep_or_shutdown(duration: Duration, shutdown: &Shutdown) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.cancelled() => {}
    }
}
