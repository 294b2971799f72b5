//! HTTP upstream client (spec §4.4, §4.5), grounded on `dome_rest.rs::DomeRestClient`
//! (pooled `reqwest::Client`, `get_activity`/`get_orders` pagination) and
//! `dome_tracker.rs::DomeClient::retry_request` (status-driven retry classification).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::domain::{Position, Trade, Wallet};
use crate::error::FetchError;
use crate::retry::with_retry;
use crate::upstream::dto::{WireMarket, WirePosition, WireTrade};
use crate::upstream::{MarketStatus, UpstreamClient};

const DATA_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const MARKET_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const POSITIONS_PAGE_SIZE: u32 = 500;

pub struct HttpUpstreamClient {
    client: Client,
    base_url: String,
}

impl HttpUpstreamClient {
    pub fn new(base_url: String, market_status_api_key: Option<String>) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .user_agent("traderwatch-ingest/0.1 (+wallet copy-trading pipeline)")
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60));

        if let Some(key) = market_status_api_key {
            use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
            builder = builder.default_headers(headers);
        }

        Ok(Self { client: builder.build()?, base_url })
    }

    fn classify_status(status: StatusCode, body: &str) -> FetchError {
        FetchError::from_status(status.as_u16(), body.chars().take(200).collect::<String>())
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        deadline: Duration,
    ) -> Result<serde_json::Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.get(&url).query(query);

        let response = tokio::time::timeout(deadline, request.send())
            .await
            .map_err(|_| FetchError::timeout(format!("GET {path} timed out after {deadline:?}")))?
            .map_err(|e| FetchError::Retryable { status: None, message: e.to_string() })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Retryable { status: None, message: e.to_string() })?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| FetchError::Permanent { status: None, message: format!("malformed JSON body: {e}") })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn fetch_trades_page(
        &self,
        wallet: &Wallet,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Trade>, FetchError> {
        with_retry(|| async {
            let body = self
                .get_json(
                    "/trades",
                    &[
                        ("user", wallet.as_str().to_string()),
                        ("limit", limit.to_string()),
                        ("offset", offset.to_string()),
                    ],
                    DATA_FETCH_TIMEOUT,
                )
                .await?;

            // Deserialize as per-element raw values first so each trade's `raw` column
            // holds only its own upstream object, not the whole page (spec §3).
            let elements: Vec<serde_json::Value> = serde_json::from_value(body)
                .map_err(|e| FetchError::Permanent { status: None, message: e.to_string() })?;

            elements
                .into_iter()
                .map(|raw| {
                    let wire: WireTrade = serde_json::from_value(raw.clone())
                        .map_err(|e| FetchError::Permanent { status: None, message: e.to_string() })?;
                    wire.into_domain(wallet, raw)
                })
                .collect()
        })
        .await
    }

    async fn fetch_positions(&self, wallet: &Wallet) -> Result<Vec<Position>, FetchError> {
        let mut out = Vec::new();
        let mut offset = 0u32;
        let now = Utc::now();

        loop {
            let page = with_retry(|| async {
                let result = self
                    .get_json(
                        "/positions",
                        &[
                            ("user", wallet.as_str().to_string()),
                            ("limit", POSITIONS_PAGE_SIZE.to_string()),
                            ("offset", offset.to_string()),
                        ],
                        DATA_FETCH_TIMEOUT,
                    )
                    .await;

                // 404/400 means "no positions" (spec §4.5), not an error.
                match result {
                    Err(FetchError::Permanent { status: Some(404), .. })
                    | Err(FetchError::Permanent { status: Some(400), .. }) => {
                        Ok(serde_json::Value::Array(vec![]))
                    }
                    other => other,
                }
            })
            .await?;

            // Per-element raw values, same reasoning as `fetch_trades_page`: each
            // position's `raw` column should hold only its own upstream object.
            let elements: Vec<serde_json::Value> = serde_json::from_value(page)
                .map_err(|e| FetchError::Permanent { status: None, message: e.to_string() })?;

            let page_len = elements.len();
            for raw in elements {
                let wire: WirePosition = serde_json::from_value(raw.clone())
                    .map_err(|e| FetchError::Permanent { status: None, message: e.to_string() })?;
                out.push(wire.into_domain(wallet, now, raw)?);
            }

            if page_len < POSITIONS_PAGE_SIZE as usize {
                break;
            }
            offset += POSITIONS_PAGE_SIZE;
        }

        Ok(out)
    }

    async fn is_market_closed(&self, market_id: &str) -> Result<MarketStatus, FetchError> {
        let result = with_retry(|| async {
            self.get_json(&format!("/markets/{market_id}"), &[], MARKET_PROBE_TIMEOUT).await
        })
        .await;

        let body = match result {
            Ok(body) => body,
            // A market we cannot even locate is "unknown", not a hard failure for the oracle
            // caller — the reconciler treats `Unknown` conservatively (spec §4.8).
            Err(FetchError::Permanent { status: Some(404), .. }) => return Ok(MarketStatus::Unknown),
            Err(e) => return Err(e),
        };

        let wire: WireMarket = serde_json::from_value(body)
            .map_err(|e| FetchError::Permanent { status: None, message: e.to_string() })?;

        Ok(match (wire.closed, wire.resolved) {
            (Some(true), _) | (_, Some(true)) => MarketStatus::Closed,
            (Some(false), Some(false)) => MarketStatus::Open,
            _ => MarketStatus::Unknown,
        })
    }
}
