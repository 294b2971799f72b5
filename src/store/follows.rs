//! `get_active_follows` / `get_active_traders` (spec §4.6): the sets used to derive
//! wallet tier and to feed the stream ingester's follow/target classification.

use rusqlite::params;

use super::Store;
use crate::domain::Wallet;

impl Store {
    /// Wallets actively subscribed to by a follower; eligible for hot polling.
    pub fn get_active_follows(&self) -> anyhow::Result<Vec<Wallet>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT wallet FROM wallets WHERE is_follow = 1")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            if let Some(w) = Wallet::parse(&r?) {
                out.push(w);
            }
        }
        Ok(out)
    }

    /// Every tracked wallet, hot or cold.
    pub fn get_active_traders(&self) -> anyhow::Result<Vec<Wallet>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT wallet FROM wallets")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            if let Some(w) = Wallet::parse(&r?) {
                out.push(w);
            }
        }
        Ok(out)
    }

    pub fn set_follow(&self, wallet: &Wallet, is_follow: bool, is_target: bool) -> anyhow::Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO wallets (wallet, is_follow, is_target) VALUES (?1, ?2, ?3) \
             ON CONFLICT(wallet) DO UPDATE SET is_follow = excluded.is_follow, is_target = excluded.is_target",
            params![wallet.as_str(), is_follow as i64, is_target as i64],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_set_is_traders_minus_hot_set() {
        let store = Store::open_in_memory().unwrap();
        let hot = Wallet::parse("0x1111111111111111111111111111111111111111").unwrap();
        let cold = Wallet::parse("0x2222222222222222222222222222222222222222").unwrap();
        store.set_follow(&hot, true, false).unwrap();
        store.set_follow(&cold, false, false).unwrap();

        let follows = store.get_active_follows().unwrap();
        let traders = store.get_active_traders().unwrap();
        assert_eq!(follows, vec![hot.clone()]);
        assert_eq!(traders.len(), 2);
        assert!(traders.contains(&cold));
    }
}
