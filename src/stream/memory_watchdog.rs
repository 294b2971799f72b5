//! Memory watchdog (spec §4.11), grounded on `performance/memory.rs::MemoryProfiler::system_memory`
//! (cached `sysinfo::System`, `refresh_memory`, `total_memory`/`used_memory`), trimmed to
//! the one responsibility the spec calls for: log a warning when resident usage crosses
//! a fraction of total system memory.

use std::time::Duration;
use sysinfo::System;

use crate::shutdown::Shutdown;

pub async fn run(interval: Duration, threshold: f64, shutdown: Shutdown) {
    let mut system = System::new();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => return,
        }

        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            continue;
        }
        let used = system.used_memory();
        let fraction = used as f64 / total as f64;

        if fraction >= threshold {
            tracing::warn!(
                used_bytes = used,
                total_bytes = total,
                fraction,
                threshold,
                "memory usage above watchdog threshold"
            );
        } else {
            tracing::debug!(used_bytes = used, total_bytes = total, fraction, "memory watchdog sample");
        }
    }
}
