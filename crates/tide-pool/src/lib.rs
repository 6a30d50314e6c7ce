//! tide-pool — elastic, priority-ordered task execution over Tokio.
//!
//! An [`ElasticPool`] keeps `core_size` workers alive, grows towards
//! `max_size` when work waits longer than `dispatch_timeout` for an idle
//! worker, and lets workers above the floor retire after `idle_timeout`.
//!
//! # Architecture
//!
//! ```text
//! execute(work, priority)
//!   └─► PriorityRelay (tide-relay)      unbounded, highest priority first
//!         └─► Dispatcher                single task, one job in hand at a time
//!               ├─► ready worker        rendezvous through a one-shot ticket
//!               └─► new worker          if none is ready and a slot is free
//!
//! CapacityLimiter   alive workers ∈ [core_size, max_size]
//! shutdown (watch)  observed by the dispatcher and every worker
//! ```
//!
//! # Shutdown
//!
//! [`ElasticPool::shutdown`] drops queued work that has not reached a worker
//! and lets running work finish. [`ElasticPool::join`] waits for that.
//!
//! # Failures
//!
//! A panic inside submitted work is caught at the worker, counted in
//! [`PoolSnapshot::panicked`] and logged; the worker keeps serving.

pub mod config;
mod dispatcher;
pub mod error;
pub mod limiter;
pub mod pool;
mod signal;
pub mod stats;
mod worker;

pub use config::{PoolConfig, Preset, UNBOUNDED_MAX_SIZE, format_duration, parse_duration};
pub use error::{PoolError, PoolResult};
pub use pool::ElasticPool;
pub use stats::PoolSnapshot;
pub use worker::Job;
