//! `upsert_trades` (spec §4.6): batch upsert keyed on `trade_id`, latest-wins on
//! non-identity columns, guarded so `trade_timestamp` never moves backwards for a row
//! that is re-emitted out of order. Batched in ≤500-row transactions the way
//! `db_storage.rs::store_batch` wraps its `INSERT OR IGNORE` loop in one
//! `BEGIN IMMEDIATE`/`COMMIT`.

use rusqlite::params;

use super::Store;
use crate::domain::{Side, Trade};

const MAX_BATCH: usize = 500;

impl Store {
    pub fn upsert_trades(&self, rows: &[Trade]) -> anyhow::Result<()> {
        for chunk in rows.chunks(MAX_BATCH) {
            self.upsert_trades_chunk(chunk)?;
        }
        Ok(())
    }

    fn upsert_trades_chunk(&self, rows: &[Trade]) -> anyhow::Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        for row in rows {
            let side = match row.side {
                Side::Buy => "BUY",
                Side::Sell => "SELL",
            };
            tx.execute(
                r#"
                INSERT INTO trades (
                    trade_id, wallet, internal_trader_id, tx_hash, condition_id,
                    market_slug, event_slug, market_title, side, outcome, outcome_index,
                    size, price, trade_timestamp_ms, raw, source_updated_at_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ON CONFLICT(trade_id) DO UPDATE SET
                    market_slug = excluded.market_slug,
                    event_slug = excluded.event_slug,
                    market_title = excluded.market_title,
                    outcome = excluded.outcome,
                    outcome_index = excluded.outcome_index,
                    size = excluded.size,
                    price = excluded.price,
                    raw = excluded.raw,
                    source_updated_at_ms = excluded.source_updated_at_ms,
                    trade_timestamp_ms = MAX(trades.trade_timestamp_ms, excluded.trade_timestamp_ms)
                "#,
                params![
                    row.trade_id,
                    row.wallet.as_str(),
                    row.internal_trader_id,
                    row.tx_hash,
                    row.condition_id,
                    row.market_slug,
                    row.event_slug,
                    row.market_title,
                    side,
                    row.outcome,
                    row.outcome_index,
                    row.size,
                    row.price,
                    row.trade_timestamp.timestamp_millis(),
                    row.raw.to_string(),
                    now_ms,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Wallet;
    use chrono::{TimeZone, Utc};

    fn sample_trade(id: &str, ts_ms: i64, size: f64) -> Trade {
        Trade {
            trade_id: id.to_string(),
            wallet: Wallet::parse("0x1111111111111111111111111111111111111111").unwrap(),
            internal_trader_id: None,
            tx_hash: Some(id.to_string()),
            condition_id: "cond1".to_string(),
            market_slug: None,
            event_slug: None,
            market_title: None,
            side: Side::Buy,
            outcome: None,
            outcome_index: None,
            size,
            price: 0.5,
            trade_timestamp: Utc.timestamp_millis_opt(ts_ms).unwrap(),
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let rows = vec![sample_trade("t1", 1000, 5.0)];
        store.upsert_trades(&rows).unwrap();
        store.upsert_trades(&rows).unwrap();

        let conn = store.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trades", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn re_emission_does_not_move_timestamp_backwards() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_trades(&[sample_trade("t1", 2000, 5.0)]).unwrap();
        store.upsert_trades(&[sample_trade("t1", 1000, 7.0)]).unwrap();

        let conn = store.conn.lock();
        let (ts, size): (i64, f64) = conn
            .query_row(
                "SELECT trade_timestamp_ms, size FROM trades WHERE trade_id = 't1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(ts, 2000);
        assert_eq!(size, 7.0);
    }
}
