//! `get_poll_state` / `update_poll_state` (spec §4.6). Monotonicity is enforced by the
//! store, not the writer (DESIGN.md Open Question 1): the update is a guarded
//! `MAX(existing, incoming)`, so a stale write from an overlapping cycle is harmless.

use rusqlite::{params, OptionalExtension};

use super::Store;
use crate::domain::{PollState, Wallet};

impl Store {
    pub fn get_poll_state(&self, wallet: &Wallet) -> anyhow::Result<Option<PollState>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT last_trade_time_seen_ms, last_position_check_at_ms, updated_at_ms \
                 FROM wallet_poll_state WHERE wallet = ?1",
                params![wallet.as_str()],
                |row| {
                    let watermark: i64 = row.get(0)?;
                    let check_at: Option<i64> = row.get(1)?;
                    let updated_at: i64 = row.get(2)?;
                    Ok((watermark, check_at, updated_at))
                },
            )
            .optional()?;

        Ok(row.map(|(watermark, check_at, updated_at)| PollState {
            wallet: wallet.clone(),
            last_trade_time_seen: chrono::DateTime::from_timestamp_millis(watermark)
                .unwrap_or_else(chrono::Utc::now),
            last_position_check_at: check_at.and_then(chrono::DateTime::from_timestamp_millis),
            updated_at: chrono::DateTime::from_timestamp_millis(updated_at)
                .unwrap_or_else(chrono::Utc::now),
        }))
    }

    pub fn update_poll_state(
        &self,
        wallet: &Wallet,
        last_trade_time: chrono::DateTime<chrono::Utc>,
        last_position_check: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock();
        let now_ms = chrono::Utc::now().timestamp_millis();
        conn.execute(
            r#"
            INSERT INTO wallet_poll_state
                (wallet, last_trade_time_seen_ms, last_position_check_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(wallet) DO UPDATE SET
                last_trade_time_seen_ms = MAX(wallet_poll_state.last_trade_time_seen_ms, excluded.last_trade_time_seen_ms),
                last_position_check_at_ms = excluded.last_position_check_at_ms,
                updated_at_ms = excluded.updated_at_ms
            "#,
            params![
                wallet.as_str(),
                last_trade_time.timestamp_millis(),
                last_position_check.timestamp_millis(),
                now_ms,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn wallet() -> Wallet {
        Wallet::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    #[test]
    fn watermark_never_moves_backwards() {
        let store = Store::open_in_memory().unwrap();
        let w = wallet();
        let later = Utc.timestamp_millis_opt(2_000_000).unwrap();
        let earlier = Utc.timestamp_millis_opt(1_000_000).unwrap();

        store.update_poll_state(&w, later, Utc::now()).unwrap();
        store.update_poll_state(&w, earlier, Utc::now()).unwrap();

        let state = store.get_poll_state(&w).unwrap().unwrap();
        assert_eq!(state.last_trade_time_seen, later);
    }

    #[test]
    fn missing_wallet_reads_as_none() {
        let store = Store::open_in_memory().unwrap();
        let w = wallet();
        assert!(store.get_poll_state(&w).unwrap().is_none());
    }
}
