//! Stream ingester (spec §4.11): the real-time counterpart to the hot poller. Consumes
//! the upstream activity feed, buffers trades into the same store the pollers write to,
//! and — for trades belonging to a wallet on the downstream target set — dispatches a
//! best-effort copy-trade execution guarded by a circuit breaker and a bounded in-flight
//! window, then correlates the resulting fill against `orders_matched` events.

use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::breaker::{Admission, CircuitBreaker};
use crate::domain::{Side, Wallet};
use crate::downstream::DownstreamClient;
use crate::shutdown::Shutdown;
use crate::store::Store;
use crate::stream::buffer::TradeBuffer;
use crate::stream::pending_orders::PendingOrders;
use crate::upstream::ws::{ActivityFeedClient, InboundEvent};

struct FollowState {
    follow: HashSet<Wallet>,
    target: HashSet<Wallet>,
}

pub struct Ingester {
    store: Arc<Store>,
    downstream: Arc<DownstreamClient>,
    activity_feed: Arc<ActivityFeedClient>,
    breaker: Arc<CircuitBreaker>,
    pending_orders: Arc<PendingOrders>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
    flush_size: usize,
    flush_interval: Duration,
    follow_set_refresh_interval: Duration,
    pending_orders_refresh_interval: Duration,
}

impl Ingester {
    pub fn new(
        store: Arc<Store>,
        downstream: Arc<DownstreamClient>,
        activity_feed: Arc<ActivityFeedClient>,
        config: &crate::config::Config,
    ) -> Self {
        Self {
            store,
            downstream,
            activity_feed,
            breaker: Arc::new(CircuitBreaker::new(
                config.stream_breaker_failure_threshold,
                config.stream_breaker_open_duration,
            )),
            pending_orders: Arc::new(PendingOrders::new(config.stream_pending_order_ttl)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: config.stream_max_in_flight_executions,
            flush_size: config.stream_flush_size,
            flush_interval: config.stream_flush_interval,
            follow_set_refresh_interval: config.stream_follow_set_refresh_interval,
            pending_orders_refresh_interval: config.stream_pending_orders_refresh_interval,
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: Shutdown) {
        let follow_state = Arc::new(ArcSwap::from_pointee(
            self.load_follow_state().await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "initial follow/target set load failed; starting empty");
                FollowState { follow: HashSet::new(), target: HashSet::new() }
            }),
        ));

        let (tx, mut rx) = mpsc::unbounded_channel();

        let feed = Arc::clone(&self.activity_feed);
        let feed_shutdown = shutdown.clone();
        let feed_task = tokio::spawn(async move { feed.run(feed_shutdown, tx).await });

        let refresh_self = Arc::clone(&self);
        let refresh_state = Arc::clone(&follow_state);
        let refresh_shutdown = shutdown.clone();
        let refresh_task = tokio::spawn(async move {
            refresh_self.follow_set_refresh_loop(refresh_state, refresh_shutdown).await
        });

        let purge_cache = Arc::clone(&self.pending_orders);
        let purge_interval = self.pending_orders_refresh_interval;
        let purge_shutdown = shutdown.clone();
        let purge_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(purge_interval) => purge_cache.purge_stale(),
                    _ = purge_shutdown.cancelled() => return,
                }
            }
        });

        let mut buffer = TradeBuffer::new(self.flush_size, self.flush_interval);
        let flush_tick = tokio::time::sleep(self.flush_interval);
        tokio::pin!(flush_tick);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = &mut flush_tick => {
                    self.flush_buffer(&mut buffer);
                    flush_tick.as_mut().reset(tokio::time::Instant::now() + self.flush_interval);
                }
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        InboundEvent::Trade(trade) => {
                            let (is_follow, is_target) = {
                                let snapshot = follow_state.load();
                                (snapshot.follow.contains(&trade.wallet), snapshot.target.contains(&trade.wallet))
                            };
                            if is_target && trade.side == Side::Buy {
                                self.maybe_dispatch_execution(trade.clone());
                            }
                            // Feed ingestion is scoped to wallet ∈ follow_set ∪ target_set (spec §4.11);
                            // other wallets' trades pass through for execution dispatch only, never the feed.
                            if is_follow || is_target {
                                if buffer.push(trade) {
                                    self.flush_buffer(&mut buffer);
                                }
                            }
                        }
                        InboundEvent::OrderMatched(ids) => self.handle_order_matched(ids).await,
                    }
                }
            }
        }

        self.flush_buffer(&mut buffer);
        feed_task.abort();
        refresh_task.abort();
        purge_task.abort();
        tracing::info!("stream ingester exiting cleanly on shutdown signal");
    }

    fn flush_buffer(&self, buffer: &mut TradeBuffer) {
        if buffer.is_empty() {
            return;
        }
        match buffer.flush(&self.store) {
            Ok(n) => tracing::debug!(count = n, "flushed buffered stream trades"),
            Err(e) => tracing::error!(error = %e, "failed to flush stream trade buffer"),
        }
    }

    /// Best-effort, non-blocking: admission is gated by the circuit breaker and the
    /// in-flight window, and the dispatch itself runs on a detached task so a slow
    /// downstream call never backpressures the feed (spec §4.11). The primary call is
    /// `sync_trade`, which the breaker and in-flight window guard; a successful call
    /// reporting insertions fires the second, unguarded "execute" call fire-and-forget.
    fn maybe_dispatch_execution(&self, trade: crate::domain::Trade) {
        // Checked before `admit()` deliberately: `admit()` can flip an elapsed `Open`
        // breaker to `HalfOpen` as a side effect of the call, and `HalfOpen` rejects
        // every `admit()` until a `record()` resolves the single in-flight probe. If
        // the in-flight window were found saturated *after* that flip, this early
        // return would abandon the probe with no matching `record()`, wedging the
        // breaker in `HalfOpen` forever. Checking saturation first means a saturated
        // window never calls `admit()` at all, so no probe is ever started to abandon.
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst);
        if in_flight >= self.max_in_flight {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(wallet = %trade.wallet, in_flight, "in-flight execution window saturated; dropping dispatch");
            return;
        }

        if self.breaker.admit() == Admission::Reject {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(wallet = %trade.wallet, "execution breaker open; dropping dispatch");
            return;
        }

        let downstream = Arc::clone(&self.downstream);
        let pending_orders = Arc::clone(&self.pending_orders);
        let in_flight_counter = Arc::clone(&self.in_flight);
        let breaker_record = Arc::clone(&self.breaker);

        tokio::spawn(async move {
            match downstream.sync_trade(&trade.raw).await {
                Ok(resp) => {
                    breaker_record.record(true);
                    in_flight_counter.fetch_sub(1, Ordering::SeqCst);
                    if resp.inserted > 0 {
                        // Fire-and-forget: no breaker, no in-flight accounting — the
                        // primary dispatch already completed successfully.
                        tokio::spawn(async move {
                            if let Some(order_id) = downstream.execute(&trade.raw).await {
                                pending_orders.insert(order_id);
                            }
                        });
                    }
                }
                Err(e) => {
                    tracing::debug!(wallet = %trade.wallet, error = %e, "sync-trade dispatch failed");
                    breaker_record.record(!e.is_breaker_failure());
                    in_flight_counter.fetch_sub(1, Ordering::SeqCst);
                }
            }
        });
    }

    async fn handle_order_matched(&self, ids: crate::upstream::ws::OrderMatchedIds) {
        let mut candidates: Vec<String> = ids.maker_order_ids;
        candidates.extend(ids.taker_order_id);
        candidates.extend(ids.maker_order_id);

        for order_id in candidates {
            if self.pending_orders.take_if_pending(&order_id) {
                match self.downstream.notify_fill(&order_id).await {
                    Ok(resp) => tracing::debug!(order_id, updated = resp.updated, "fill notified"),
                    Err(e) => tracing::warn!(order_id, error = %e, "failed to notify downstream of fill"),
                }
            }
        }
    }

    async fn load_follow_state(&self) -> anyhow::Result<FollowState> {
        let follow = self.store.get_active_follows()?.into_iter().collect();
        let target = match self.downstream.target_traders().await {
            Ok(t) => t.traders.iter().filter_map(|w| Wallet::parse(w)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to refresh downstream target set; keeping empty");
                HashSet::new()
            }
        };
        Ok(FollowState { follow, target })
    }

    async fn follow_set_refresh_loop(self: Arc<Self>, state: Arc<ArcSwap<FollowState>>, shutdown: Shutdown) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.follow_set_refresh_interval) => {}
                _ = shutdown.cancelled() => return,
            }
            match self.load_follow_state().await {
                Ok(next) => state.store(Arc::new(next)),
                Err(e) => tracing::warn!(error = %e, "follow/target set refresh failed; keeping previous snapshot"),
            }
        }
    }
}
