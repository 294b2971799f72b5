//! Position entities (spec §3): the current-snapshot row and the immutable close event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Wallet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub wallet: Wallet,
    pub market_id: String,
    pub size: f64,
    pub redeemable: bool,
    pub last_seen_at: DateTime<Utc>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    ManualClose,
    MarketClosed,
    /// Reserved: see DESIGN.md Open Question 4. Never produced by the current reconciler —
    /// redemption is observationally identical to a manual close until upstream exposes a
    /// dedicated redemption signal.
    Redeemed,
    /// Reserved per spec §3; a partial reduction never emits a close event today.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionCloseEvent {
    pub wallet: Wallet,
    pub market_id: String,
    pub closed_reason: CloseReason,
    pub closed_at: DateTime<Utc>,
    pub raw: serde_json::Value,
}
