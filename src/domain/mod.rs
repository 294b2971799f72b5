//! Core entities (spec §3). Each is owned by the relational store; in-process
//! references to snapshots are strictly by value.

pub mod poll_state;
pub mod position;
pub mod trade;
pub mod wallet;

pub use poll_state::PollState;
pub use position::{CloseReason, Position, PositionCloseEvent};
pub use trade::{Side, Trade};
pub use wallet::Wallet;
