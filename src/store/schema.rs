//! Schema DDL, grounded on `db_storage.rs`'s `SCHEMA_SQL` (WAL mode, `WITHOUT ROWID`
//! primary-keyed tables, covering indexes).

pub const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS wallets (
    wallet TEXT PRIMARY KEY,
    is_follow INTEGER NOT NULL DEFAULT 0,
    is_target INTEGER NOT NULL DEFAULT 0
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS trades (
    trade_id TEXT PRIMARY KEY,
    wallet TEXT NOT NULL,
    internal_trader_id TEXT,
    tx_hash TEXT,
    condition_id TEXT NOT NULL,
    market_slug TEXT,
    event_slug TEXT,
    market_title TEXT,
    side TEXT NOT NULL,
    outcome TEXT,
    outcome_index INTEGER,
    size REAL NOT NULL,
    price REAL NOT NULL,
    trade_timestamp_ms INTEGER NOT NULL,
    raw TEXT NOT NULL,
    source_updated_at_ms INTEGER NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_trades_wallet_ts ON trades (wallet, trade_timestamp_ms);

CREATE TABLE IF NOT EXISTS positions_current (
    wallet TEXT NOT NULL,
    market_id TEXT NOT NULL,
    size REAL NOT NULL,
    redeemable INTEGER NOT NULL DEFAULT 0,
    last_seen_at_ms INTEGER NOT NULL,
    raw TEXT NOT NULL,
    PRIMARY KEY (wallet, market_id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS positions_closed (
    wallet TEXT NOT NULL,
    market_id TEXT NOT NULL,
    closed_at_ms INTEGER NOT NULL,
    closed_reason TEXT NOT NULL,
    raw TEXT NOT NULL,
    PRIMARY KEY (wallet, market_id, closed_at_ms)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS wallet_poll_state (
    wallet TEXT PRIMARY KEY,
    last_trade_time_seen_ms INTEGER NOT NULL,
    last_position_check_at_ms INTEGER,
    updated_at_ms INTEGER NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS named_locks (
    name TEXT PRIMARY KEY,
    locked_until_ms INTEGER,
    holder_id TEXT
) WITHOUT ROWID;
"#;
