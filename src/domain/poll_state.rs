//! Wallet poll state (spec §3): the per-wallet ingestion watermark.

use chrono::{DateTime, Utc};

use super::Wallet;

#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    pub wallet: Wallet,
    /// Monotone non-decreasing upper bound on trades already accounted for.
    pub last_trade_time_seen: DateTime<Utc>,
    pub last_position_check_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PollState {
    pub fn initial(wallet: Wallet, now: DateTime<Utc>) -> Self {
        // Epoch watermark: any real trade timestamp is strictly greater, so the first
        // cycle's `timestamp > watermark` filter (spec §4.7) admits everything.
        Self {
            wallet,
            last_trade_time_seen: DateTime::<Utc>::UNIX_EPOCH,
            last_position_check_at: None,
            updated_at: now,
        }
    }
}
