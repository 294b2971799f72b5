//! Per-wallet poll cycle (spec §4.7), grounded on `dome_tracker.rs::get_orders_paginated`'s
//! pagination-until-short-page loop, generalized with the watermark cutoff and the
//! reconciler hookup the spec adds on top.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{PollState, Wallet};
use crate::error::FetchError;
use crate::ratelimit::{TokenBucket, WalletCooldown};
use crate::reconcile::reconcile;
use crate::store::Store;
use crate::upstream::{MarketStatus, UpstreamClient};

const TRADES_PAGE_SIZE: u32 = 200;

/// A cycle's terminal failure, distinguishing a timed-out upstream call (spec §4.4,
/// §4.9: "tolerated up to a generous threshold", never counted toward the hot poller's
/// error budget) from any other failure (permanent 4xx, malformed payload, store error).
#[derive(Debug)]
pub enum CycleError {
    Timeout(anyhow::Error),
    Other(anyhow::Error),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::Timeout(e) => write!(f, "{e}"),
            CycleError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl CycleError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CycleError::Timeout(_))
    }

    fn from_fetch(context: &str, e: FetchError) -> Self {
        // Timeouts surface as `FetchError::Retryable { status: Some(408), .. }` (spec §4.4);
        // a real upstream 408 response is synthetically indistinguishable and is treated
        // the same way, consistent with how the wire format conflates the two.
        if matches!(e.status(), Some(408)) {
            CycleError::Timeout(anyhow::anyhow!("{context}: {e}"))
        } else {
            CycleError::Other(anyhow::anyhow!("{context}: {e}"))
        }
    }
}

impl From<anyhow::Error> for CycleError {
    fn from(e: anyhow::Error) -> Self {
        CycleError::Other(e)
    }
}

/// Runs one full cycle for a single wallet: walk new trade pages, flush them, fetch the
/// positions snapshot, reconcile against the previous one, and advance the watermark.
/// Returns `Ok(())` on success; any error here means the orchestrator logs and moves on
/// to the next wallet (spec §4.7 failure policy) without advancing the watermark.
pub async fn run_cycle(
    wallet: &Wallet,
    store: &Store,
    upstream: &dyn UpstreamClient,
    rate_limiter: &TokenBucket,
    cooldown: &WalletCooldown,
) -> Result<(), CycleError> {
    cooldown.wait_if_needed(wallet).await;

    let poll_state = store
        .get_poll_state(wallet)?
        .unwrap_or_else(|| PollState::initial(wallet.clone(), Utc::now()));
    let watermark = poll_state.last_trade_time_seen;

    let mut offset = 0u32;
    let mut new_rows = Vec::new();
    let mut max_ts_seen = watermark;

    loop {
        rate_limiter.acquire().await;
        let page = upstream
            .fetch_trades_page(wallet, TRADES_PAGE_SIZE, offset)
            .await
            .map_err(|e| CycleError::from_fetch("fetch_trades_page failed", e))?;

        let page_len = page.len();
        // Upstream returns newest-first; a short page or one whose oldest trade has
        // already been seen means no older page can contain anything new (spec §4.7).
        let oldest_already_seen = page.last().map(|t| t.trade_timestamp <= watermark).unwrap_or(true);

        for trade in page {
            // Strict `>`: timestamps exactly equal to the watermark are excluded (spec §8).
            if trade.trade_timestamp > watermark {
                if trade.trade_timestamp > max_ts_seen {
                    max_ts_seen = trade.trade_timestamp;
                }
                new_rows.push(trade);
            }
        }

        if page_len < TRADES_PAGE_SIZE as usize || oldest_already_seen {
            break;
        }
        offset += TRADES_PAGE_SIZE;
    }

    if !new_rows.is_empty() {
        store.upsert_trades(&new_rows).map_err(CycleError::from)?;
    }

    rate_limiter.acquire().await;
    let curr_positions = upstream
        .fetch_positions(wallet)
        .await
        .map_err(|e| CycleError::from_fetch("fetch_positions failed", e))?;
    let prev_positions = store.get_current_positions(wallet).map_err(CycleError::from)?;

    let disappeared: Vec<&str> = {
        let curr_ids: std::collections::HashSet<&str> =
            curr_positions.iter().map(|p| p.market_id.as_str()).collect();
        prev_positions
            .iter()
            .map(|p| p.market_id.as_str())
            .filter(|id| !curr_ids.contains(id))
            .collect()
    };

    // Bounded fan-out: one oracle lookup per disappeared market, concurrently (spec §5).
    let mut oracle_answers = HashMap::new();
    let lookups = futures_util::future::join_all(
        disappeared.iter().map(|market_id| async move {
            (market_id.to_string(), upstream.is_market_closed(market_id).await)
        }),
    )
    .await;
    for (market_id, result) in lookups {
        let status = result.unwrap_or(MarketStatus::Unknown);
        oracle_answers.insert(market_id, status);
    }

    let now = Utc::now();
    let outcome = reconcile(&prev_positions, &curr_positions, &oracle_answers, now);

    if !outcome.close_events.is_empty() {
        store.emit_position_closed(&outcome.close_events)?;
    }
    for (market_id, new_size) in &outcome.size_deltas {
        tracing::debug!(%wallet, market_id, new_size, "position size changed beyond tolerance; not a close");
    }
    store.upsert_current_positions(wallet, &curr_positions)?;
    if !outcome.removed_market_ids.is_empty() {
        store.remove_positions(wallet, &outcome.removed_market_ids)?;
    }

    store.update_poll_state(wallet, max_ts_seen, now)?;

    Ok(())
}

/// Thin wrapper so orchestrators can be constructed once and shared across wallets
/// within one worker without re-threading every dependency at each call site.
pub struct Orchestrator {
    pub store: Arc<Store>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub rate_limiter: TokenBucket,
    pub cooldown: WalletCooldown,
}

impl Orchestrator {
    pub async fn run_cycle(&self, wallet: &Wallet) -> Result<(), CycleError> {
        run_cycle(wallet, &self.store, self.upstream.as_ref(), &self.rate_limiter, &self.cooldown).await
    }
}
