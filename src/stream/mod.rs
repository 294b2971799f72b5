//! Real-time trade-stream ingester (spec §4.11): consumes the upstream activity feed,
//! buffers and flushes trades through the same store the pollers write to, and
//! dispatches copy-trade executions for target-set wallets through a circuit breaker.

pub mod buffer;
pub mod ingester;
pub mod memory_watchdog;
pub mod pending_orders;

pub use ingester::Ingester;
