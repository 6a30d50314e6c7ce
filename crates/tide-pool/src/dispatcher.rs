//! Dispatcher — the single loop that moves work from the relay to workers.
//!
//! ```text
//! loop:
//!   job = relay.recv()                       (or shutdown)
//!   loop:
//!     ticket from a ready worker within dispatch_timeout?
//!       yes → send job through it            (worker retired meanwhile → retry)
//!       no  → reserve a slot, spawn a worker seeded with job
//!             pool full → park on the ready queue until a worker frees up
//! ```
//!
//! While the pool is full the dispatcher stops pulling from the relay, so
//! excess work waits there in priority order.

use std::sync::Arc;
use std::time::Duration;

use tide_relay::RelayReceiver;
use tokio::sync::mpsc;
use tokio::time::error::Elapsed;
use tracing::{debug, info};

use crate::signal::ShutdownSignal;
use crate::worker::{Job, Ticket, WorkerContext};

enum Handoff {
    Delivered,
    Cancelled,
}

pub(crate) struct Dispatcher {
    relay: RelayReceiver<Job>,
    ready: mpsc::UnboundedReceiver<Ticket>,
    workers: Arc<WorkerContext>,
    shutdown: ShutdownSignal,
    dispatch_timeout: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        relay: RelayReceiver<Job>,
        ready: mpsc::UnboundedReceiver<Ticket>,
        workers: Arc<WorkerContext>,
        shutdown: ShutdownSignal,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            relay,
            ready,
            workers,
            shutdown,
            dispatch_timeout,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let job = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                job = self.relay.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            if let Handoff::Cancelled = self.hand_off(job).await {
                break;
            }
        }

        self.stop();
    }

    /// Give `job` to a worker, growing the pool or waiting as needed.
    async fn hand_off(&mut self, mut job: Job) -> Handoff {
        let mut saturated = false;
        loop {
            let wait = (!saturated).then_some(self.dispatch_timeout);
            let ready = &mut self.ready;
            let ticket = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.workers.stats.record_discarded(1);
                    return Handoff::Cancelled;
                }
                ticket = next_ticket(ready, wait) => ticket,
            };

            match ticket {
                Ok(Some(ticket)) => match ticket.send(job) {
                    Ok(()) => {
                        self.workers.stats.record_dispatched();
                        return Handoff::Delivered;
                    }
                    // The worker retired before we got to it.
                    Err(returned) => {
                        job = returned;
                        saturated = false;
                    }
                },
                Ok(None) => {
                    self.workers.stats.record_discarded(1);
                    return Handoff::Cancelled;
                }
                Err(_elapsed) => match self.workers.grow(job) {
                    Ok(()) => {
                        self.workers.stats.record_dispatched();
                        return Handoff::Delivered;
                    }
                    Err(returned) => {
                        job = returned;
                        if !saturated {
                            debug!(
                                alive = self.workers.limiter.alive(),
                                pending = self.relay.pending(),
                                "pool saturated, holding work until a worker is free"
                            );
                        }
                        saturated = true;
                    }
                },
            }
        }
    }

    /// Close the relay and drop whatever it still holds.
    fn stop(&mut self) {
        let discarded = self.relay.pending();
        self.relay.close();
        self.workers.stats.record_discarded(discarded as u64);
        info!(discarded, "dispatcher stopped");
    }
}

/// Wait for the next ready worker, giving up after `wait` if set.
async fn next_ticket(
    ready: &mut mpsc::UnboundedReceiver<Ticket>,
    wait: Option<Duration>,
) -> Result<Option<Ticket>, Elapsed> {
    match wait {
        Some(wait) => tokio::time::timeout(wait, ready.recv()).await,
        None => Ok(ready.recv().await),
    }
}
