//! tide-relay — unbounded, priority-ordered handoff queue.
//!
//! Producers submit `(value, priority)` pairs through a cloneable
//! [`RelaySender`] without ever blocking. A single [`RelayReceiver`]
//! receives them in priority order. One coordinator task owns the backlog;
//! both handles talk to it over channels, so the backlog is never shared.
//!
//! # Delivery
//!
//! ```text
//! submit(v, p) ──► coordinator ──┬─► consumer parked in recv()?  hand v over directly
//!                                └─► otherwise insert into PriorityBuffer
//!
//! recv() ──► demand ──► coordinator absorbs queued submissions,
//!                       then delivers the buffer head (or parks the demand)
//! ```
//!
//! The backlog is kept in non-increasing priority order; equal priorities
//! are delivered first-in, first-out. Closing the relay discards whatever is
//! still buffered.

pub mod buffer;
pub mod error;
pub mod relay;

pub use buffer::{Prioritized, PriorityBuffer};
pub use error::RelayClosed;
pub use relay::{RelayReceiver, RelaySender, channel};
