//! Position reconciler (spec §4.8): a pure function over two snapshots and a
//! market-status oracle. No teacher analog carries this logic directly — it is built
//! from the spec and exercised with the same inline `#[cfg(test)] mod tests` style
//! used throughout this crate's other pure-function modules.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::{CloseReason, Position};
use crate::upstream::MarketStatus;

/// Absolute tolerance for size-delta classification, in **share units** (DESIGN.md
/// Open Question 2): a position whose size changes by no more than this is considered
/// unchanged for close-detection purposes, though the new size is still recorded.
pub const SIZE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Close events to emit via `emit_position_closed`.
    pub close_events: Vec<crate::domain::PositionCloseEvent>,
    /// The full set of positions to persist via `upsert_current_positions`.
    pub retained: Vec<Position>,
    /// Market ids that disappeared and should be removed from `positions_current`
    /// once the corresponding close event above has been durably recorded.
    pub removed_market_ids: Vec<String>,
    /// `(market_id, new_size)` for every position present in both snapshots whose size
    /// moved by more than [`SIZE_TOLERANCE`] — a partial reduction/increase worth the
    /// caller logging, never a close event (spec §4.8).
    pub size_deltas: Vec<(String, f64)>,
}

/// Diffs `prev` against `curr`. `oracle_answers` supplies the already-resolved
/// `is_market_closed` result for every market id in `prev` that is absent from `curr` —
/// callers are expected to have done the (bounded-concurrency) oracle fan-out before
/// calling this function, keeping it pure and synchronous.
pub fn reconcile(
    prev: &[Position],
    curr: &[Position],
    oracle_answers: &HashMap<String, MarketStatus>,
    now: DateTime<Utc>,
) -> ReconcileOutcome {
    let prev_by_market: HashMap<&str, &Position> =
        prev.iter().map(|p| (p.market_id.as_str(), p)).collect();
    let curr_by_market: HashMap<&str, &Position> =
        curr.iter().map(|p| (p.market_id.as_str(), p)).collect();

    let mut close_events = Vec::new();
    let mut removed_market_ids = Vec::new();
    let mut size_deltas = Vec::new();

    for (market_id, prev_pos) in &prev_by_market {
        if let Some(curr_pos) = curr_by_market.get(market_id) {
            if (curr_pos.size - prev_pos.size).abs() > SIZE_TOLERANCE {
                size_deltas.push((market_id.to_string(), curr_pos.size));
            }
            continue;
        }

        let status = oracle_answers.get(*market_id).copied().unwrap_or(MarketStatus::Unknown);
        let reason = match status {
            MarketStatus::Closed => CloseReason::MarketClosed,
            // `Open` and `Unknown` both map to `manual_close`: a disappearance from a
            // still-open (or unconfirmed) market means the holder explicitly exited.
            MarketStatus::Open | MarketStatus::Unknown => CloseReason::ManualClose,
        };

        close_events.push(crate::domain::PositionCloseEvent {
            wallet: prev_pos.wallet.clone(),
            market_id: market_id.to_string(),
            closed_reason: reason,
            closed_at: now,
            raw: prev_pos.raw.clone(),
        });
        removed_market_ids.push(market_id.to_string());
    }

    // curr is always the authoritative retained set: every position present now is
    // recorded with its latest size, whether or not it changed (spec §4.8 size-delta
    // handling never blocks the size update, only the close-event emission).
    let retained = curr.to_vec();

    ReconcileOutcome { close_events, retained, removed_market_ids, size_deltas }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Wallet;

    fn wallet() -> Wallet {
        Wallet::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    fn position(market_id: &str, size: f64) -> Position {
        Position {
            wallet: wallet(),
            market_id: market_id.to_string(),
            size,
            redeemable: false,
            last_seen_at: Utc::now(),
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn s2_market_close_classification() {
        let prev = vec![position("m1", 5.0), position("m2", 3.0)];
        let curr = vec![position("m1", 5.0)];
        let mut oracle = HashMap::new();
        oracle.insert("m2".to_string(), MarketStatus::Closed);

        let out = reconcile(&prev, &curr, &oracle, Utc::now());

        assert_eq!(out.close_events.len(), 1);
        assert_eq!(out.close_events[0].market_id, "m2");
        assert_eq!(out.close_events[0].closed_reason, CloseReason::MarketClosed);
        assert_eq!(out.retained.len(), 1);
        assert_eq!(out.retained[0].market_id, "m1");
    }

    #[test]
    fn s3_manual_close_under_oracle_uncertainty() {
        let prev = vec![position("m1", 5.0), position("m2", 3.0)];
        let curr = vec![position("m1", 5.0)];
        let mut oracle = HashMap::new();
        oracle.insert("m2".to_string(), MarketStatus::Unknown);

        let out = reconcile(&prev, &curr, &oracle, Utc::now());

        assert_eq!(out.close_events.len(), 1);
        assert_eq!(out.close_events[0].closed_reason, CloseReason::ManualClose);
    }

    #[test]
    fn s4_partial_reduction_is_not_a_close() {
        let prev = vec![position("m1", 5.0)];
        let curr = vec![position("m1", 2.0)];

        let out = reconcile(&prev, &curr, &HashMap::new(), Utc::now());

        assert!(out.close_events.is_empty());
        assert_eq!(out.retained[0].size, 2.0);
        assert_eq!(out.size_deltas, vec![("m1".to_string(), 2.0)]);
    }

    #[test]
    fn size_change_within_tolerance_is_not_a_delta() {
        let prev = vec![position("m1", 5.0)];
        let curr = vec![position("m1", 5.0 + SIZE_TOLERANCE / 2.0)];

        let out = reconcile(&prev, &curr, &HashMap::new(), Utc::now());

        assert!(out.size_deltas.is_empty());
    }

    #[test]
    fn empty_current_closes_every_previous_position() {
        let prev = vec![position("m1", 5.0), position("m2", 1.0), position("m3", 9.0)];
        let curr: Vec<Position> = vec![];

        let out = reconcile(&prev, &curr, &HashMap::new(), Utc::now());

        assert_eq!(out.close_events.len(), prev.len());
        assert!(out.retained.is_empty());
    }

    #[test]
    fn reconciler_is_pure_and_deterministic() {
        let prev = vec![position("m1", 5.0), position("m2", 3.0)];
        let curr = vec![position("m1", 5.0)];
        let mut oracle = HashMap::new();
        oracle.insert("m2".to_string(), MarketStatus::Closed);
        let now = Utc::now();

        let a = reconcile(&prev, &curr, &oracle, now);
        let b = reconcile(&prev, &curr, &oracle, now);
        assert_eq!(a, b);
    }
}
