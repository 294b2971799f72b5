//! L1 relational store adapter (spec §4.6), grounded on `src/signals/db_storage.rs`:
//! a `parking_lot::Mutex`-guarded rusqlite connection in WAL mode, `INSERT OR IGNORE` +
//! explicit `BEGIN IMMEDIATE`/`COMMIT` batching for idempotent upserts.

mod follows;
mod locks;
mod poll_state;
mod positions;
mod schema;
mod trades;

use parking_lot::Mutex;
use rusqlite::Connection;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}
