//! Worker — runs handed-off work until shutdown or idle retirement.
//!
//! A worker announces it is ready by posting a [`Ticket`] to the dispatcher
//! and then parks on the matching receiver. The dispatcher completes the
//! rendezvous by sending exactly one job through the ticket, so a job only
//! ever moves to a worker that is waiting for it.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::limiter::{CapacityLimiter, Slot};
use crate::signal::ShutdownSignal;
use crate::stats::PoolStats;

/// A unit of work. Runs to completion once started; its output is dropped.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Completes one handoff from the dispatcher to a parked worker.
pub(crate) type Ticket = oneshot::Sender<Job>;

/// Everything a worker needs, shared by all workers of one pool.
pub(crate) struct WorkerContext {
    core_size: usize,
    idle_timeout: Duration,
    ready: mpsc::UnboundedSender<Ticket>,
    pub(crate) limiter: Arc<CapacityLimiter>,
    pub(crate) stats: Arc<PoolStats>,
    shutdown: ShutdownSignal,
    next_id: AtomicU64,
}

impl WorkerContext {
    pub(crate) fn new(
        core_size: usize,
        idle_timeout: Duration,
        ready: mpsc::UnboundedSender<Ticket>,
        limiter: Arc<CapacityLimiter>,
        stats: Arc<PoolStats>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            core_size,
            idle_timeout,
            ready,
            limiter,
            stats,
            shutdown,
            next_id: AtomicU64::new(0),
        }
    }

    /// Start the core workers.
    pub(crate) fn spawn_core(self: &Arc<Self>) {
        for _ in 0..self.core_size {
            match self.limiter.try_reserve() {
                Some(slot) => self.spawn(slot, None),
                None => break,
            }
        }
    }

    /// Start one more worker seeded with `job`, if the ceiling allows it.
    /// Hands the job back when the pool is full.
    pub(crate) fn grow(self: &Arc<Self>, job: Job) -> Result<(), Job> {
        match self.limiter.try_reserve() {
            Some(slot) => {
                self.spawn(slot, Some(job));
                debug!(alive = self.limiter.alive(), "pool grew");
                Ok(())
            }
            None => Err(job),
        }
    }

    fn spawn(self: &Arc<Self>, slot: Slot, first: Option<Job>) {
        let worker = Worker {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            slot,
            shutdown: self.shutdown.clone(),
            ctx: self.clone(),
        };
        self.stats.record_spawned();
        tokio::spawn(worker.run(first));
    }
}

struct Worker {
    id: u64,
    /// Held for the worker's whole life; released on drop.
    slot: Slot,
    shutdown: ShutdownSignal,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    async fn run(mut self, first: Option<Job>) {
        debug!(worker = self.id, alive = self.ctx.limiter.alive(), "worker started");

        let mut next = first;
        loop {
            if let Some(job) = next.take() {
                self.execute(job).await;
            }
            match self.wait_for_work().await {
                Some(job) => next = Some(job),
                None => break,
            }
        }

        debug!(worker = self.id, "worker stopped");
    }

    /// Run one job. A panic is contained here and the worker carries on.
    async fn execute(&self, job: Job) {
        let panicked = AssertUnwindSafe(job).catch_unwind().await.is_err();
        if panicked {
            warn!(worker = self.id, "work item panicked; worker continues");
        }
        self.ctx.stats.record_executed(panicked);
    }

    /// Park until the dispatcher hands over a job. `None` means stop.
    async fn wait_for_work(&mut self) -> Option<Job> {
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }
            let (ticket, mut delivery) = oneshot::channel();
            if self.ctx.ready.send(ticket).is_err() {
                // Dispatcher is gone.
                return None;
            }

            loop {
                tokio::select! {
                    biased;
                    // A job already handed over is run even during shutdown.
                    job = &mut delivery => return job.ok(),
                    _ = self.shutdown.cancelled() => return None,
                    _ = tokio::time::sleep(self.ctx.idle_timeout) => {
                        if self.ctx.limiter.alive() <= self.ctx.core_size {
                            continue;
                        }
                        // Withdraw the ticket; a job that raced in still runs.
                        delivery.close();
                        if let Ok(job) = delivery.try_recv() {
                            return Some(job);
                        }
                        if self.slot.try_retire(self.ctx.core_size) {
                            self.ctx.stats.record_retired();
                            debug!(
                                worker = self.id,
                                alive = self.ctx.limiter.alive(),
                                "idle worker retired"
                            );
                            return None;
                        }
                        // Lost the race to the floor; post a fresh ticket.
                        break;
                    }
                }
            }
        }
    }
}
