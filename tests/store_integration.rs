//! Integration coverage against a real on-disk sqlite file (spec §10.4), exercising the
//! idempotence and monotonicity invariants from spec §8 across a process-like `Store::open`
//! rather than the in-memory connection the unit tests use.

use chrono::{TimeZone, Utc};
use tempfile::NamedTempFile;

use traderwatch_backend::domain::{PollState, Side, Trade, Wallet};
use traderwatch_backend::store::Store;

fn wallet() -> Wallet {
    Wallet::parse("0x1111111111111111111111111111111111111111").unwrap()
}

fn open_tmp_store() -> (NamedTempFile, Store) {
    let file = NamedTempFile::new().unwrap();
    let store = Store::open(file.path().to_str().unwrap()).unwrap();
    (file, store)
}

fn trade(id: &str, ts_ms: i64) -> Trade {
    Trade {
        trade_id: id.to_string(),
        wallet: wallet(),
        internal_trader_id: None,
        tx_hash: Some(id.to_string()),
        condition_id: "cond1".to_string(),
        market_slug: None,
        event_slug: None,
        market_title: None,
        side: Side::Buy,
        outcome: None,
        outcome_index: None,
        size: 1.0,
        price: 0.5,
        trade_timestamp: Utc.timestamp_millis_opt(ts_ms).unwrap(),
        raw: serde_json::json!({}),
    }
}

fn at_ms(ms: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

#[test]
fn trades_and_poll_state_survive_a_reopen_of_the_same_file() {
    let (file, store) = open_tmp_store();

    store.upsert_trades(&[trade("t1", 1000), trade("t2", 2000)]).unwrap();
    store.update_poll_state(&wallet(), at_ms(2000), Utc::now()).unwrap();
    drop(store);

    let reopened = Store::open(file.path().to_str().unwrap()).unwrap();
    let state = reopened.get_poll_state(&wallet()).unwrap().unwrap();
    assert_eq!(state.last_trade_time_seen, at_ms(2000));
}

#[test]
fn poll_state_watermark_never_regresses_across_reopens() {
    let (file, store) = open_tmp_store();
    store.update_poll_state(&wallet(), at_ms(5000), Utc::now()).unwrap();
    drop(store);

    let reopened = Store::open(file.path().to_str().unwrap()).unwrap();
    reopened.update_poll_state(&wallet(), at_ms(1000), Utc::now()).unwrap();
    let state = reopened.get_poll_state(&wallet()).unwrap().unwrap();
    assert_eq!(state.last_trade_time_seen, at_ms(5000));
}

#[test]
fn named_lock_survives_across_connections_to_the_same_file() {
    let (file, store) = open_tmp_store();
    assert!(store.acquire_named_lock("cold_poll", chrono::Duration::minutes(65), "replica-a").unwrap());
    drop(store);

    let reopened = Store::open(file.path().to_str().unwrap()).unwrap();
    assert!(!reopened.acquire_named_lock("cold_poll", chrono::Duration::minutes(65), "replica-b").unwrap());
}

#[test]
fn fresh_wallet_has_no_poll_state_until_first_cycle() {
    let (_file, store) = open_tmp_store();
    assert!(store.get_poll_state(&wallet()).unwrap().is_none());
    let fallback = PollState::initial(wallet(), Utc::now());
    assert_eq!(fallback.last_trade_time_seen, chrono::DateTime::<Utc>::UNIX_EPOCH);
}
