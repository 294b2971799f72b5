//! Cold poller (spec §4.10): a long-tail sweep over every tracked wallet outside the
//! hot set, serialized across replicas by a named lock so only one process runs a
//! sweep at a time, with the lock held well past the nominal interval (spec §8
//! invariant 5) so a slow sweep never overlaps the next one.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::poller::Orchestrator;
use crate::shutdown::Shutdown;

/// Extend the held lock this often during a sweep so a sweep longer than
/// `cold_lock_duration` does not lose the lock to another replica mid-flight.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30 * 60);

pub async fn run(
    orchestrator: Orchestrator,
    lock_name: String,
    lock_duration: chrono::Duration,
    interval: Duration,
    extend_every_n_wallets: u32,
    holder_id: String,
    shutdown: Shutdown,
) {
    loop {
        if shutdown.is_triggered() {
            tracing::info!("cold poller exiting cleanly on shutdown signal");
            return;
        }

        match orchestrator.store.acquire_named_lock(&lock_name, lock_duration, &holder_id) {
            Ok(true) => {
                run_sweep(&orchestrator, &lock_name, lock_duration, extend_every_n_wallets, &holder_id, &shutdown)
                    .await;
            }
            Ok(false) => {
                tracing::debug!(lock_name = %lock_name, "cold lock held elsewhere; skipping this cycle");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to attempt cold lock acquisition");
            }
        }

        let jitter_ms: u64 = rand::thread_rng().gen_range(0..60_000);
        sleep_or_shutdown(interval + Duration::from_millis(jitter_ms), &shutdown).await;
    }
}

async fn run_sweep(
    orchestrator: &Orchestrator,
    lock_name: &str,
    lock_duration: chrono::Duration,
    extend_every_n_wallets: u32,
    holder_id: &str,
    shutdown: &Shutdown,
) {
    let hot_set = match orchestrator.store.get_active_follows() {
        Ok(set) => set.into_iter().collect::<std::collections::HashSet<_>>(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load hot set; treating as empty for this sweep");
            std::collections::HashSet::new()
        }
    };

    let cold_set: Vec<_> = match orchestrator.store.get_active_traders() {
        Ok(all) => all.into_iter().filter(|w| !hot_set.contains(w)).collect(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load trader set; aborting this sweep");
            release(orchestrator, lock_name, holder_id);
            return;
        }
    };

    tracing::info!(count = cold_set.len(), "starting cold sweep");

    let heartbeat_store = Arc::clone(&orchestrator.store);
    let heartbeat_lock_name = lock_name.to_string();
    let heartbeat_holder = holder_id.to_string();
    let heartbeat_shutdown = shutdown.clone();
    let heartbeat = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {}
                _ = heartbeat_shutdown.cancelled() => return,
            }
            if let Err(e) =
                heartbeat_store.extend_named_lock(&heartbeat_lock_name, lock_duration, &heartbeat_holder)
            {
                tracing::warn!(error = %e, "failed to heartbeat-extend cold lock");
            }
        }
    });

    for (i, wallet) in cold_set.iter().enumerate() {
        if shutdown.is_triggered() {
            break;
        }

        if i > 0 && extend_every_n_wallets > 0 && i as u32 % extend_every_n_wallets == 0 {
            if let Err(e) = orchestrator.store.extend_named_lock(lock_name, lock_duration, holder_id) {
                tracing::warn!(error = %e, "failed to extend cold lock mid-sweep");
            }
        }

        if let Err(e) = orchestrator.run_cycle(wallet).await {
            tracing::warn!(%wallet, error = %e, "cold poll cycle failed for wallet; continuing sweep");
        }
    }

    heartbeat.abort();
    release(orchestrator, lock_name, holder_id);
    tracing::info!("cold sweep finished");
}

fn release(orchestrator: &Orchestrator, lock_name: &str, holder_id: &str) {
    if let Err(e) = orchestrator.store.release_named_lock(lock_name, holder_id) {
        tracing::error!(error = %e, "failed to release cold lock");
    }
}

async fn sleep_or_shutdown(duration: Duration, shutdown: &Shutdown) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.cancelled() => {}
    }
}
