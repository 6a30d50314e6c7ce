//! ElasticPool — the public handle tying relay, dispatcher and workers
//! together.

use std::future::Future;
use std::sync::Arc;

use tide_relay::RelaySender;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::PoolConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{PoolError, PoolResult};
use crate::limiter::CapacityLimiter;
use crate::signal;
use crate::stats::{PoolSnapshot, PoolStats};
use crate::worker::{Job, WorkerContext};

/// A pool of workers that grows from `core_size` towards `max_size` under
/// load and shrinks back after `idle_timeout`.
///
/// Work is submitted with a priority and dispatched highest first. When every
/// worker is busy and the ceiling is reached, new work waits in the relay;
/// [`execute`](Self::execute) never blocks.
///
/// Dropping the pool shuts it down.
pub struct ElasticPool {
    config: PoolConfig,
    relay: RelaySender<Job>,
    limiter: Arc<CapacityLimiter>,
    stats: Arc<PoolStats>,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ElasticPool {
    /// Validate `config`, start the core workers and the dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let (shutdown_tx, shutdown) = signal::channel();
        let (relay_tx, relay_rx) = tide_relay::channel();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let limiter = CapacityLimiter::new(config.max_size);
        let stats = Arc::new(PoolStats::default());

        let workers = Arc::new(WorkerContext::new(
            config.core_size,
            config.idle_timeout,
            ready_tx,
            limiter.clone(),
            stats.clone(),
            shutdown.clone(),
        ));
        workers.spawn_core();

        let dispatcher = Dispatcher::new(
            relay_rx,
            ready_rx,
            workers,
            shutdown,
            config.dispatch_timeout,
        );
        let handle = tokio::spawn(dispatcher.run());

        info!(
            core = config.core_size,
            max = config.max_size,
            idle_timeout = ?config.idle_timeout,
            dispatch_timeout = ?config.dispatch_timeout,
            "elastic pool started"
        );

        Ok(Self {
            config,
            relay: relay_tx,
            limiter,
            stats,
            shutdown_tx,
            dispatcher: Mutex::new(Some(handle)),
        })
    }

    /// No floor, unbounded ceiling, idle workers retire after a minute.
    pub fn cached() -> PoolResult<Self> {
        Self::new(PoolConfig::cached())
    }

    /// Exactly `size` workers.
    pub fn fixed(size: usize) -> PoolResult<Self> {
        Self::new(PoolConfig::fixed(size))
    }

    /// One worker; work runs strictly one at a time in priority order.
    pub fn single() -> PoolResult<Self> {
        Self::new(PoolConfig::single())
    }

    /// Queue async work at `priority`. Returns immediately.
    ///
    /// Fails with [`PoolError::ShutDown`] once the pool is shutting down.
    /// Work still queued when shutdown happens is dropped without running.
    pub fn execute<F>(&self, work: F, priority: i32) -> PoolResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit(Box::pin(work), priority)
    }

    /// Queue a blocking closure at `priority`.
    ///
    /// The closure runs on Tokio's blocking thread pool while the worker that
    /// picked it up waits, so it counts against the pool's ceiling like any
    /// other work.
    pub fn execute_blocking<F>(&self, work: F, priority: i32) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(
            Box::pin(async move {
                if let Err(err) = tokio::task::spawn_blocking(work).await {
                    if err.is_panic() {
                        std::panic::resume_unwind(err.into_panic());
                    }
                }
            }),
            priority,
        )
    }

    fn submit(&self, job: Job, priority: i32) -> PoolResult<()> {
        if self.is_shutdown() {
            return Err(PoolError::ShutDown);
        }
        self.relay
            .submit(job, priority)
            .map_err(|_| PoolError::ShutDown)?;
        self.stats.record_submitted();
        Ok(())
    }

    /// Stop dispatching. Queued work is dropped; running work finishes.
    /// Calling it again has no effect.
    pub fn shutdown(&self) {
        let first = self.shutdown_tx.send_if_modified(|stop| {
            let changed = !*stop;
            *stop = true;
            changed
        });
        if first {
            info!(
                alive = self.limiter.alive(),
                pending = self.relay.pending(),
                "elastic pool shutting down"
            );
        }
    }

    /// Wait for the dispatcher and every worker to exit.
    ///
    /// Only resolves after [`shutdown`](Self::shutdown); running work is
    /// allowed to finish first.
    pub async fn join(&self) {
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "dispatcher task failed");
            }
        }
        self.limiter.wait_drained().await;
    }

    pub async fn shutdown_and_join(&self) {
        self.shutdown();
        self.join().await;
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Workers currently alive, busy or idle.
    pub fn alive_workers(&self) -> usize {
        self.limiter.alive()
    }

    /// Work waiting in the relay for the dispatcher.
    pub fn pending(&self) -> usize {
        self.relay.pending()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> PoolSnapshot {
        self.stats.snapshot(self.limiter.alive(), self.relay.pending())
    }
}

impl Drop for ElasticPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
