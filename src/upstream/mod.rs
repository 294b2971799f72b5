//! Upstream adapter (spec §4.5): read operations against the public trade/position
//! venue, plus the market-status oracle and the WebSocket activity feed.

pub mod dto;
pub mod http;
pub mod ws;

use async_trait::async_trait;

use crate::domain::{Position, Trade, Wallet};
use crate::error::FetchError;

/// Whether a market is closed, as reported by the upstream oracle. `Unknown` is a
/// distinct case from `false`: the reconciler (§4.8) maps it to `manual_close`, but a
/// caller that only needs "is it still open" treats `Unknown` as not-closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Closed,
    Open,
    Unknown,
}

/// The upstream adapter's read surface. A trait so the orchestrators and reconciler can
/// be driven by an in-memory fake in tests, never a live HTTP call (spec §10.4).
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch_trades_page(
        &self,
        wallet: &Wallet,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Trade>, FetchError>;

    async fn fetch_positions(&self, wallet: &Wallet) -> Result<Vec<Position>, FetchError>;

    async fn is_market_closed(&self, market_id: &str) -> Result<MarketStatus, FetchError>;
}
