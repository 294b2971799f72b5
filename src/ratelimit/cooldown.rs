//! Per-wallet cooldown (spec §4.2), grounded directly on `dome_tracker.rs`'s
//! `last_request: Arc<Mutex<Option<Instant>>>` pattern, keyed per-wallet instead of
//! per-client so distinct wallets sharing one rate-limiter budget still each get a
//! minimum inter-call gap.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::domain::Wallet;

pub struct WalletCooldown {
    gap: Duration,
    last_call: Mutex<HashMap<Wallet, Instant>>,
}

impl WalletCooldown {
    pub fn new(gap: Duration) -> Self {
        Self { gap, last_call: Mutex::new(HashMap::new()) }
    }

    pub async fn wait_if_needed(&self, wallet: &Wallet) {
        let wait = {
            let mut map = self.last_call.lock();
            match map.get(wallet) {
                Some(last) => {
                    let elapsed = last.elapsed();
                    if elapsed < self.gap {
                        Some(self.gap - elapsed)
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        if let Some(d) = wait {
            sleep(d).await;
        }

        self.last_call.lock().insert(wallet.clone(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_minimum_gap_per_wallet() {
        let cooldown = WalletCooldown::new(Duration::from_millis(30));
        let w = Wallet::parse("0x1111111111111111111111111111111111111111").unwrap();

        let start = Instant::now();
        cooldown.wait_if_needed(&w).await;
        cooldown.wait_if_needed(&w).await;
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn distinct_wallets_do_not_block_each_other() {
        let cooldown = WalletCooldown::new(Duration::from_secs(10));
        let w1 = Wallet::parse("0x1111111111111111111111111111111111111111").unwrap();
        let w2 = Wallet::parse("0x2222222222222222222222222222222222222222").unwrap();

        let start = Instant::now();
        cooldown.wait_if_needed(&w1).await;
        cooldown.wait_if_needed(&w2).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
