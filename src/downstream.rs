//! Downstream control-plane HTTP client (spec §6), grounded on
//! `dome_rest.rs::DomeRestClient` (pooled `reqwest::Client`, Bearer auth header).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of a breaker-guarded downstream call, carrying enough of the HTTP status to
/// let the caller classify it per the breaker's own rules (spec §4.12): only a status
/// >= 500, 408, or a timeout counts as a breaker failure — any other 4xx is a success
/// for breaker accounting even though the call itself didn't get what it wanted.
#[derive(Debug)]
pub enum DispatchError {
    /// The response (or timeout) carries a status the breaker should count as a failure.
    BreakerFailure(anyhow::Error),
    /// An explicit 4xx (other than 408): a real rejection, but not a breaker failure.
    Rejected(anyhow::Error),
}

impl DispatchError {
    pub fn is_breaker_failure(&self) -> bool {
        matches!(self, DispatchError::BreakerFailure(_))
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::BreakerFailure(e) => write!(f, "{e}"),
            DispatchError::Rejected(e) => write!(f, "{e}"),
        }
    }
}

fn classify_status(status: reqwest::StatusCode, e: reqwest::Error) -> DispatchError {
    if status.as_u16() >= 500 || status.as_u16() == 408 {
        DispatchError::BreakerFailure(e.into())
    } else {
        DispatchError::Rejected(e.into())
    }
}

pub struct DownstreamClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TargetTraders {
    pub traders: Vec<String>,
    #[serde(default)]
    pub has_leaderboard_wallets: bool,
}

#[derive(Debug, Serialize)]
struct SyncTradeRequest<'a> {
    trade: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct SyncTradeResponse {
    pub inserted: u32,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ExecuteResponse {
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WsFillRequest<'a> {
    order_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct WsFillResponse {
    pub updated: bool,
    #[serde(default)]
    pub new_status: Option<String>,
    #[serde(default)]
    pub fill_rate: Option<f64>,
}

impl DownstreamClient {
    pub fn new(base_url: String, bearer: String) -> anyhow::Result<Self> {
        use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {bearer}"))?);

        let client = Client::builder().default_headers(headers).timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    pub async fn target_traders(&self) -> anyhow::Result<TargetTraders> {
        let url = format!("{}/target-traders", self.base_url);
        Ok(self.client.get(url).send().await?.error_for_status()?.json().await?)
    }

    /// The execution dispatch's primary call (spec §4.11): forwards the trade to the
    /// control plane, which reports how many rows it inserted. Guarded by the caller's
    /// circuit breaker and in-flight window; the returned [`DispatchError`] lets the
    /// caller classify the failure the way the breaker requires (spec §4.12).
    pub async fn sync_trade(
        &self,
        raw_trade: &serde_json::Value,
    ) -> Result<SyncTradeResponse, DispatchError> {
        let url = format!("{}/sync-trade", self.base_url);
        let body = SyncTradeRequest { trade: raw_trade };
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::BreakerFailure(e.into()))?;
        match resp.error_for_status_ref() {
            Ok(_) => resp
                .json()
                .await
                .map_err(|e| DispatchError::Rejected(anyhow::anyhow!("malformed sync-trade response: {e}"))),
            Err(e) => Err(classify_status(resp.status(), e)),
        }
    }

    /// Best-effort second "execute" call (spec §4.11), fired only after a successful
    /// `sync_trade` reports insertions. Fire-and-forget: failures are logged, never
    /// propagated, and never touch the breaker. Returns the downstream order id when
    /// the control plane accepted the trade and reported one, so the caller can
    /// register it for fill correlation.
    pub async fn execute(&self, raw_trade: &serde_json::Value) -> Option<String> {
        let url = format!("{}/execute", self.base_url);
        let body = SyncTradeRequest { trade: raw_trade };
        match self.client.post(url).json(&body).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => resp.json::<ExecuteResponse>().await.ok().and_then(|r| r.order_id),
                Err(e) => {
                    tracing::debug!(error = %e, "best-effort execute dispatch rejected");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "best-effort execute dispatch failed");
                None
            }
        }
    }

    pub async fn notify_fill(&self, order_id: &str) -> anyhow::Result<WsFillResponse> {
        let url = format!("{}/ws-fill", self.base_url);
        let body = WsFillRequest { order_id };
        Ok(self.client.post(url).json(&body).send().await?.error_for_status()?.json().await?)
    }
}
