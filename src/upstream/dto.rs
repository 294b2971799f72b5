//! Wire DTOs for the upstream HTTP surface (spec §6), grounded on `dome_rest.rs`'s
//! `ActivityItem`/`DomeOrder`/`DomeMarket` shapes, and the explicit-parser idiom from
//! spec §9: numeric/timestamp fields are parsed through [`FieldValue`] rather than
//! coerced, so a malformed field becomes a parse error instead of a silently dropped one.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::domain::{Position, Side, Trade, Wallet};
use crate::error::FetchError;

#[derive(Debug, Deserialize)]
pub struct WireTrade {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Option<String>,
    #[serde(rename = "conditionId")]
    pub condition_id: String,
    pub side: String,
    pub outcome: Option<String>,
    #[serde(rename = "outcomeIndex")]
    pub outcome_index: Option<i32>,
    pub size: serde_json::Value,
    pub price: serde_json::Value,
    pub timestamp: serde_json::Value,
    pub title: Option<String>,
    #[serde(rename = "marketSlug")]
    pub market_slug: Option<String>,
    #[serde(rename = "eventSlug")]
    pub event_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WirePosition {
    #[serde(rename = "conditionId")]
    pub condition_id: Option<String>,
    pub asset: Option<String>,
    pub size: serde_json::Value,
    pub redeemable: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct WireMarket {
    pub closed: Option<bool>,
    pub resolved: Option<bool>,
}

/// The outcome of parsing a wire field: present and valid, legitimately absent, or
/// present-but-malformed. Only the last case is a parse error (spec §9).
enum FieldValue<T> {
    Value(T),
    Missing,
    Invalid,
}

fn parse_number(v: &serde_json::Value) -> FieldValue<f64> {
    match v {
        serde_json::Value::Null => FieldValue::Missing,
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => FieldValue::Value(f),
            _ => FieldValue::Invalid,
        },
        serde_json::Value::String(s) => match s.parse::<f64>() {
            Ok(f) if f.is_finite() => FieldValue::Value(f),
            _ => FieldValue::Invalid,
        },
        _ => FieldValue::Invalid,
    }
}

/// Upstream timestamps arrive as either seconds or milliseconds since epoch (spec §6);
/// disambiguated by magnitude the way the teacher's scrapers do for Dome/Polymarket feeds.
fn parse_timestamp(v: &serde_json::Value) -> FieldValue<DateTime<Utc>> {
    let raw = match parse_number(v) {
        FieldValue::Value(f) => f,
        FieldValue::Missing => return FieldValue::Missing,
        FieldValue::Invalid => return FieldValue::Invalid,
    };
    let millis = if raw > 1e12 { raw as i64 } else { (raw * 1000.0) as i64 };
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => FieldValue::Value(dt),
        None => FieldValue::Invalid,
    }
}

fn required_number(field: &str, v: &serde_json::Value) -> Result<f64, FetchError> {
    match parse_number(v) {
        FieldValue::Value(f) => Ok(f),
        FieldValue::Missing => {
            Err(FetchError::Permanent { status: None, message: format!("missing field {field}") })
        }
        FieldValue::Invalid => {
            Err(FetchError::Permanent { status: None, message: format!("invalid field {field}") })
        }
    }
}

fn required_timestamp(field: &str, v: &serde_json::Value) -> Result<DateTime<Utc>, FetchError> {
    match parse_timestamp(v) {
        FieldValue::Value(dt) => Ok(dt),
        FieldValue::Missing => {
            Err(FetchError::Permanent { status: None, message: format!("missing field {field}") })
        }
        FieldValue::Invalid => {
            Err(FetchError::Permanent { status: None, message: format!("invalid field {field}") })
        }
    }
}

impl WireTrade {
    pub fn into_domain(self, wallet: &Wallet, raw: serde_json::Value) -> Result<Trade, FetchError> {
        let size = required_number("size", &self.size)?;
        let price = required_number("price", &self.price)?;
        let trade_timestamp = required_timestamp("timestamp", &self.timestamp)?;

        let side = match self.side.to_ascii_uppercase().as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            other => {
                return Err(FetchError::Permanent {
                    status: None,
                    message: format!("unrecognized side {other}"),
                })
            }
        };

        let trade_id = match &self.transaction_hash {
            Some(hash) if !hash.is_empty() => hash.clone(),
            _ => Trade::synthetic_id(wallet, &self.condition_id, trade_timestamp),
        };

        Ok(Trade {
            trade_id,
            wallet: wallet.clone(),
            internal_trader_id: None,
            tx_hash: self.transaction_hash,
            condition_id: self.condition_id,
            market_slug: self.market_slug,
            event_slug: self.event_slug,
            market_title: self.title,
            side,
            outcome: self.outcome,
            outcome_index: self.outcome_index,
            size,
            price,
            trade_timestamp,
            raw,
        })
    }
}

impl WirePosition {
    pub fn into_domain(
        self,
        wallet: &Wallet,
        now: DateTime<Utc>,
        raw: serde_json::Value,
    ) -> Result<Position, FetchError> {
        let size = required_number("size", &self.size)?;
        let market_id = self.condition_id.or(self.asset).ok_or_else(|| FetchError::Permanent {
            status: None,
            message: "position missing both conditionId and asset".to_string(),
        })?;

        Ok(Position {
            wallet: wallet.clone(),
            market_id,
            size,
            redeemable: self.redeemable.unwrap_or(false),
            last_seen_at: now,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_millisecond_timestamp() {
        let v = serde_json::json!(1_700_000_000_000i64);
        match parse_timestamp(&v) {
            FieldValue::Value(dt) => assert_eq!(dt.timestamp_millis(), 1_700_000_000_000),
            _ => panic!("expected value"),
        }
    }

    #[test]
    fn parses_second_timestamp() {
        let v = serde_json::json!(1_700_000_000i64);
        match parse_timestamp(&v) {
            FieldValue::Value(dt) => assert_eq!(dt.timestamp(), 1_700_000_000),
            _ => panic!("expected value"),
        }
    }

    #[test]
    fn non_finite_number_is_invalid_not_missing() {
        let v = serde_json::json!("not-a-number");
        assert!(matches!(parse_number(&v), FieldValue::Invalid));
    }

    #[test]
    fn null_is_missing_not_invalid() {
        assert!(matches!(parse_number(&serde_json::Value::Null), FieldValue::Missing));
    }
}
