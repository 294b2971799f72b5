//! Batch buffer for stream-sourced trades (spec §4.11), grounded on `db_storage.rs`'s
//! batching of writes into bounded transactions: trades accumulate in memory and are
//! flushed through [`crate::store::Store::upsert_trades`] once the buffer reaches
//! `flush_size` or `flush_interval` has elapsed since the last flush, whichever first.

use std::time::{Duration, Instant};

use crate::domain::Trade;
use crate::store::Store;

pub struct TradeBuffer {
    flush_size: usize,
    flush_interval: Duration,
    pending: Vec<Trade>,
    last_flush: Instant,
}

impl TradeBuffer {
    pub fn new(flush_size: usize, flush_interval: Duration) -> Self {
        Self { flush_size, flush_interval, pending: Vec::new(), last_flush: Instant::now() }
    }

    /// Buffers a trade, returning `true` if the buffer should be flushed now.
    pub fn push(&mut self, trade: Trade) -> bool {
        self.pending.push(trade);
        self.should_flush()
    }

    pub fn should_flush(&self) -> bool {
        self.pending.len() >= self.flush_size || self.last_flush.elapsed() >= self.flush_interval
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Flushes whatever is buffered to the store. Rows are upserted by `trade_id`, so a
    /// trade the poller already wrote is harmlessly re-written, never duplicated.
    pub fn flush(&mut self, store: &Store) -> anyhow::Result<usize> {
        self.last_flush = Instant::now();
        if self.pending.is_empty() {
            return Ok(0);
        }
        let rows = std::mem::take(&mut self.pending);
        let count = rows.len();
        store.upsert_trades(&rows)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, Wallet};
    use chrono::Utc;

    fn trade(id: &str) -> Trade {
        Trade {
            trade_id: id.to_string(),
            wallet: Wallet::parse("0x1111111111111111111111111111111111111111").unwrap(),
            internal_trader_id: None,
            tx_hash: None,
            condition_id: "cond1".to_string(),
            market_slug: None,
            event_slug: None,
            market_title: None,
            side: Side::Buy,
            outcome: None,
            outcome_index: None,
            size: 1.0,
            price: 0.5,
            trade_timestamp: Utc::now(),
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn flushes_at_size_threshold() {
        let mut buf = TradeBuffer::new(2, Duration::from_secs(3600));
        assert!(!buf.push(trade("t1")));
        assert!(buf.push(trade("t2")));
    }

    #[test]
    fn flushes_after_interval_even_below_size_threshold() {
        let mut buf = TradeBuffer::new(100, Duration::from_millis(1));
        buf.push(trade("t1"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(buf.should_flush());
    }

    #[test]
    fn flush_against_store_persists_and_clears_buffer() {
        let store = Store::open_in_memory().unwrap();
        let mut buf = TradeBuffer::new(10, Duration::from_secs(3600));
        buf.push(trade("t1"));
        buf.push(trade("t2"));
        let n = buf.flush(&store).unwrap();
        assert_eq!(n, 2);
        assert!(buf.is_empty());
    }
}
