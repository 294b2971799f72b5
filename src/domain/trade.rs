//! Trade entity (spec §3): an immutable record of one fill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Wallet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Upstream tx hash when present, else the deterministic tuple
    /// `(wallet, asset|market, upstream_timestamp)` encoded as a string (see
    /// [`Trade::synthetic_id`]).
    pub trade_id: String,
    pub wallet: Wallet,
    pub internal_trader_id: Option<String>,
    pub tx_hash: Option<String>,
    pub condition_id: String,
    pub market_slug: Option<String>,
    pub event_slug: Option<String>,
    pub market_title: Option<String>,
    pub side: Side,
    pub outcome: Option<String>,
    pub outcome_index: Option<i32>,
    pub size: f64,
    pub price: f64,
    pub trade_timestamp: DateTime<Utc>,
    /// Opaque upstream payload kept for forensic replay (spec §9).
    pub raw: serde_json::Value,
}

impl Trade {
    pub fn synthetic_id(wallet: &Wallet, market_or_asset: &str, timestamp: DateTime<Utc>) -> String {
        format!("{}:{}:{}", wallet.as_str(), market_or_asset, timestamp.timestamp_millis())
    }
}
