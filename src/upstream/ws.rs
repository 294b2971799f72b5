//! Upstream WebSocket activity feed (spec §4.11, §6), grounded on
//! `dome_websocket.rs::DomeWebSocketClient` (subscribe message, reconnect-with-backoff
//! loop, ping/pong handling, `WebSocketConfig` frame sizing).

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use crate::domain::{Trade, Wallet};
use crate::shutdown::Shutdown;
use crate::upstream::dto::WireTrade;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub enum InboundEvent {
    Trade(Trade),
    OrderMatched(OrderMatchedIds),
}

#[derive(Debug, Clone, Default)]
pub struct OrderMatchedIds {
    pub taker_order_id: Option<String>,
    pub maker_order_id: Option<String>,
    pub maker_order_ids: Vec<String>,
}

#[derive(Serialize)]
struct SubscribeMessage<'a> {
    #[serde(rename = "type")]
    msg_type: &'a str,
    topics: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(flatten)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireTradeEnvelope {
    #[serde(alias = "proxyWallet", alias = "user", alias = "wallet")]
    wallet: String,
    #[serde(flatten)]
    trade: WireTrade,
}

#[derive(Debug, Deserialize, Default)]
struct WireOrdersMatched {
    #[serde(rename = "takerOrderId")]
    taker_order_id: Option<String>,
    #[serde(rename = "makerOrderId")]
    maker_order_id: Option<String>,
    #[serde(rename = "makerOrders")]
    maker_orders: Option<Vec<WireMakerOrder>>,
}

#[derive(Debug, Deserialize)]
struct WireMakerOrder {
    #[serde(rename = "orderId")]
    order_id: String,
}

pub struct ActivityFeedClient {
    ws_url: String,
}

impl ActivityFeedClient {
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// Runs the reconnect loop until shutdown is triggered. Each successfully parsed
    /// event is pushed to `tx`; parse failures are logged and skipped (spec §4.11
    /// treats malformed frames as non-fatal).
    pub async fn run(&self, shutdown: Shutdown, tx: mpsc::UnboundedSender<InboundEvent>) {
        while !shutdown.is_triggered() {
            match self.connect_and_stream(&shutdown, &tx).await {
                Ok(()) => {}
                Err(e) => tracing::warn!(error = %e, "activity feed disconnected; reconnecting"),
            }

            if shutdown.is_triggered() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = shutdown.cancelled() => break,
            }
        }
    }

    async fn connect_and_stream(
        &self,
        shutdown: &Shutdown,
        tx: &mpsc::UnboundedSender<InboundEvent>,
    ) -> anyhow::Result<()> {
        tracing::info!(url = %self.ws_url, "connecting to upstream activity feed");

        let config = WebSocketConfig {
            max_message_size: Some(16 << 20),
            max_frame_size: Some(4 << 20),
            accept_unmasked_frames: false,
            ..Default::default()
        };

        let (ws_stream, _resp) =
            tokio_tungstenite::connect_async_with_config(&self.ws_url, Some(config), false).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = SubscribeMessage { msg_type: "subscribe", topics: &["trades", "orders_matched"] };
        write.send(Message::Text(serde_json::to_string(&subscribe)?)).await?;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                msg = read.next() => {
                    let Some(msg) = msg else { return Ok(()) };
                    match msg? {
                        Message::Text(text) => self.handle_text(&text, tx),
                        Message::Ping(payload) => { let _ = write.send(Message::Pong(payload)).await; }
                        Message::Close(frame) => {
                            tracing::debug!(?frame, "activity feed closed by peer");
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn handle_text(&self, text: &str, tx: &mpsc::UnboundedSender<InboundEvent>) {
        let envelope: WireEnvelope = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "failed to parse activity feed envelope");
                return;
            }
        };

        match envelope.msg_type.as_str() {
            "trades" | "trade" => {
                let wire: WireTradeEnvelope = match serde_json::from_value(envelope.data.clone()) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!(error = %e, "failed to parse trade event");
                        return;
                    }
                };
                let Some(wallet) = Wallet::parse(&wire.wallet) else {
                    tracing::debug!(wallet = %wire.wallet, "activity feed trade has malformed wallet");
                    return;
                };
                match wire.trade.into_domain(&wallet, envelope.data) {
                    Ok(trade) => {
                        let _ = tx.send(InboundEvent::Trade(trade));
                    }
                    Err(e) => tracing::debug!(error = %e, "failed to convert wire trade"),
                }
            }
            "orders_matched" => {
                let wire: WireOrdersMatched = serde_json::from_value(envelope.data).unwrap_or_default();
                let ids = OrderMatchedIds {
                    taker_order_id: wire.taker_order_id,
                    maker_order_id: wire.maker_order_id,
                    maker_order_ids: wire
                        .maker_orders
                        .unwrap_or_default()
                        .into_iter()
                        .map(|m| m.order_id)
                        .collect(),
                };
                let _ = tx.send(InboundEvent::OrderMatched(ids));
            }
            other => tracing::debug!(msg_type = other, "ignoring unrecognized activity feed message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_message_serializes_both_topics() {
        let msg = SubscribeMessage { msg_type: "subscribe", topics: &["trades", "orders_matched"] };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("trades"));
        assert!(json.contains("orders_matched"));
    }

    #[test]
    fn orders_matched_parses_maker_orders_array() {
        let raw = serde_json::json!({
            "makerOrders": [{"orderId": "a"}, {"orderId": "b"}],
        });
        let wire: WireOrdersMatched = serde_json::from_value(raw).unwrap();
        assert_eq!(wire.maker_orders.unwrap().len(), 2);
    }
}
