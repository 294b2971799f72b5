//! `get_current_positions` / `upsert_current_positions` / `emit_position_closed`
//! (spec §4.6). Positions absent from an incoming snapshot are never deleted by
//! `upsert_current_positions` itself — their removal is the reconciler's job (§4.8).

use rusqlite::params;

use super::Store;
use crate::domain::{CloseReason, Position, PositionCloseEvent, Wallet};

impl Store {
    pub fn get_current_positions(&self, wallet: &Wallet) -> anyhow::Result<Vec<Position>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT market_id, size, redeemable, last_seen_at_ms, raw \
             FROM positions_current WHERE wallet = ?1",
        )?;
        let rows = stmt.query_map(params![wallet.as_str()], |row| {
            let raw: String = row.get(4)?;
            let last_seen_ms: i64 = row.get(3)?;
            Ok(Position {
                wallet: wallet.clone(),
                market_id: row.get(0)?,
                size: row.get(1)?,
                redeemable: row.get::<_, i64>(2)? != 0,
                last_seen_at: chrono::DateTime::from_timestamp_millis(last_seen_ms)
                    .unwrap_or_else(chrono::Utc::now),
                raw: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn upsert_current_positions(&self, wallet: &Wallet, snapshot: &[Position]) -> anyhow::Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for p in snapshot {
            tx.execute(
                r#"
                INSERT INTO positions_current (wallet, market_id, size, redeemable, last_seen_at_ms, raw)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(wallet, market_id) DO UPDATE SET
                    size = excluded.size,
                    redeemable = excluded.redeemable,
                    last_seen_at_ms = excluded.last_seen_at_ms,
                    raw = excluded.raw
                "#,
                params![
                    wallet.as_str(),
                    p.market_id,
                    p.size,
                    p.redeemable as i64,
                    p.last_seen_at.timestamp_millis(),
                    p.raw.to_string(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Removes rows from `positions_current` for markets that disappeared in the latest
    /// snapshot, after the reconciler has already emitted the corresponding close events.
    pub fn remove_positions(&self, wallet: &Wallet, market_ids: &[String]) -> anyhow::Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for market_id in market_ids {
            tx.execute(
                "DELETE FROM positions_current WHERE wallet = ?1 AND market_id = ?2",
                params![wallet.as_str(), market_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn emit_position_closed(&self, events: &[PositionCloseEvent]) -> anyhow::Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for e in events {
            let reason = match e.closed_reason {
                CloseReason::ManualClose => "manual_close",
                CloseReason::MarketClosed => "market_closed",
                CloseReason::Redeemed => "redeemed",
                CloseReason::Partial => "partial",
            };
            tx.execute(
                r#"
                INSERT OR IGNORE INTO positions_closed
                    (wallet, market_id, closed_at_ms, closed_reason, raw)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    e.wallet.as_str(),
                    e.market_id,
                    e.closed_at.timestamp_millis(),
                    reason,
                    e.raw.to_string(),
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
    use chrono::Utc;

    fn wallet() -> Wallet {
        Wallet::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    #[test]
    fn upsert_then_read_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let w = wallet();
        let pos = Position {
            wallet: w.clone(),
            market_id: "m1".to_string(),
            size: 5.0,
            redeemable: false,
            last_seen_at: Utc::now(),
            raw: serde_json::json!({"x": 1}),
        };
        store.upsert_current_positions(&w, &[pos.clone()]).unwrap();
        let got = store.get_current_positions(&w).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].size, 5.0);
    }

    #[test]
    fn emit_position_closed_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let w = wallet();
        let event = PositionCloseEvent {
            wallet: w.clone(),
            market_id: "m1".to_string(),
            closed_reason: CloseReason::ManualClose,
            closed_at: Utc::now(),
            raw: serde_json::Value::Null,
        };
        store.emit_position_closed(&[event.clone()]).unwrap();
        store.emit_position_closed(&[event]).unwrap();

        let conn = store.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM positions_closed", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
