//! Relay handles and the coordinator task that owns the backlog.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc::error::{SendError, TryRecvError};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::buffer::{Prioritized, PriorityBuffer};
use crate::error::RelayClosed;

/// Messages accepted on the inbound side.
enum Inbound<T> {
    Item(Prioritized<T>),
    Close,
}

/// A parked consumer waiting for exactly one value.
type Demand<T> = oneshot::Sender<T>;

/// State readable from either handle without going through the coordinator.
#[derive(Default)]
struct Shared {
    /// Backlog depth, written only by the coordinator.
    pending: AtomicUsize,
    closed: AtomicBool,
}

/// Create a relay and spawn its coordinator on the current Tokio runtime.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime, like `tokio::spawn`.
pub fn channel<T: Send + 'static>() -> (RelaySender<T>, RelayReceiver<T>) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (demand_tx, demand_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::default());

    let coordinator = Coordinator {
        buffer: PriorityBuffer::new(),
        waiting: None,
        inbound: inbound_rx,
        demands: demand_rx,
        shared: shared.clone(),
    };
    tokio::spawn(coordinator.run());

    let receiver = RelayReceiver {
        demands: demand_tx,
        inbound: inbound_tx.downgrade(),
        delivery: None,
        shared: shared.clone(),
    };
    let sender = RelaySender {
        inbound: inbound_tx,
        shared,
    };
    (sender, receiver)
}

/// Producer handle. Cheap to clone; submissions never block.
///
/// The relay closes once every sender is dropped, or on an explicit
/// [`close`](Self::close).
pub struct RelaySender<T> {
    inbound: mpsc::UnboundedSender<Inbound<T>>,
    shared: Arc<Shared>,
}

impl<T> Clone for RelaySender<T> {
    fn clone(&self) -> Self {
        Self {
            inbound: self.inbound.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<T> RelaySender<T> {
    /// Enqueue a value at the given priority. Higher priorities are
    /// delivered first.
    ///
    /// Submitting to a closed relay is rejected and the value handed back.
    pub fn submit(&self, value: T, priority: i32) -> Result<(), RelayClosed<T>> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(RelayClosed(value));
        }
        let item = Prioritized::new(value, priority);
        if let Err(SendError(Inbound::Item(item))) = self.inbound.send(Inbound::Item(item)) {
            return Err(RelayClosed(item.value));
        }
        Ok(())
    }

    /// Stop accepting submissions. Buffered values are discarded.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            let _ = self.inbound.send(Inbound::Close);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of values buffered and not yet delivered.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }
}

/// Single consumer handle.
pub struct RelayReceiver<T> {
    demands: mpsc::UnboundedSender<Demand<T>>,
    /// Weak so that dropping every sender still closes the relay.
    inbound: mpsc::WeakUnboundedSender<Inbound<T>>,
    /// Outstanding demand, kept across dropped `recv` futures.
    delivery: Option<oneshot::Receiver<T>>,
    shared: Arc<Shared>,
}

impl<T> RelayReceiver<T> {
    /// Receive the highest-priority value, waiting if the backlog is empty.
    ///
    /// Returns `None` once the relay is closed. Cancel-safe: if the future
    /// is dropped before completing, no value is lost and the next call
    /// resumes the same wait.
    pub async fn recv(&mut self) -> Option<T> {
        if self.delivery.is_none() {
            let (tx, rx) = oneshot::channel();
            self.demands.send(tx).ok()?;
            self.delivery = Some(rx);
        }
        let delivery = self.delivery.as_mut()?;
        let value = delivery.await.ok();
        self.delivery = None;
        value
    }

    /// Stop accepting submissions. Buffered values are discarded and
    /// pending or future `recv` calls return `None`.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            if let Some(inbound) = self.inbound.upgrade() {
                let _ = inbound.send(Inbound::Close);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of values buffered and not yet delivered.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }
}

/// Owns the backlog. The only task that ever touches `buffer`.
struct Coordinator<T> {
    buffer: PriorityBuffer<T>,
    /// Consumer parked while the backlog was empty.
    waiting: Option<Demand<T>>,
    inbound: mpsc::UnboundedReceiver<Inbound<T>>,
    demands: mpsc::UnboundedReceiver<Demand<T>>,
    shared: Arc<Shared>,
}

impl<T: Send + 'static> Coordinator<T> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                message = self.inbound.recv() => match message {
                    Some(Inbound::Item(item)) => self.accept(item),
                    Some(Inbound::Close) | None => break,
                },
                demand = self.demands.recv() => {
                    let Some(demand) = demand else { break };
                    if self.absorb_queued().is_break() {
                        break;
                    }
                    self.serve(demand);
                }
            }
            self.shared
                .pending
                .store(self.buffer.len(), Ordering::Release);
        }
        self.teardown();
    }

    /// Hand a new item straight to a parked consumer, or buffer it.
    fn accept(&mut self, item: Prioritized<T>) {
        let Some(demand) = self.waiting.take() else {
            self.buffer.push(item);
            return;
        };
        let priority = item.priority;
        if let Err(value) = demand.send(item.value) {
            self.buffer.push(Prioritized::new(value, priority));
        }
    }

    /// Move everything already submitted into the backlog so it is ordered
    /// before the head is delivered.
    fn absorb_queued(&mut self) -> ControlFlow<()> {
        loop {
            match self.inbound.try_recv() {
                Ok(Inbound::Item(item)) => self.buffer.push(item),
                Ok(Inbound::Close) | Err(TryRecvError::Disconnected) => {
                    return ControlFlow::Break(());
                }
                Err(TryRecvError::Empty) => return ControlFlow::Continue(()),
            }
        }
    }

    fn serve(&mut self, demand: Demand<T>) {
        match self.buffer.pop() {
            Some(item) => {
                let priority = item.priority;
                if let Err(value) = demand.send(item.value) {
                    self.buffer.restore(Prioritized::new(value, priority));
                }
            }
            None => self.waiting = Some(demand),
        }
    }

    fn teardown(mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.inbound.close();

        let mut discarded = self.buffer.clear();
        while let Ok(message) = self.inbound.try_recv() {
            if let Inbound::Item(_) = message {
                discarded += 1;
            }
        }
        self.shared.pending.store(0, Ordering::Release);

        debug!(discarded, "priority relay closed");
        // Dropping `waiting` and `demands` wakes the consumer with `None`.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_pending<T>(sender: &RelaySender<T>, expected: usize) {
        for _ in 0..200 {
            if sender.pending() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pending never reached {expected}, is {}", sender.pending());
    }

    #[tokio::test]
    async fn delivers_in_priority_order() {
        let (tx, mut rx) = channel();
        for (value, priority) in [("a", 1), ("b", 5), ("c", 3), ("d", 5)] {
            tx.submit(value, priority).unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(rx.recv().await.unwrap());
        }
        assert_eq!(received, vec!["b", "d", "c", "a"]);
    }

    #[tokio::test]
    async fn pending_tracks_backlog_depth() {
        let (tx, mut rx) = channel();
        for i in 0..3 {
            tx.submit(i, 0).unwrap();
        }
        wait_for_pending(&tx, 3).await;

        assert_eq!(rx.recv().await, Some(0));
        wait_for_pending(&tx, 2).await;
        assert_eq!(rx.pending(), 2);
    }

    #[tokio::test]
    async fn parked_consumer_gets_item_directly() {
        let (tx, mut rx) = channel();
        let consumer = tokio::spawn(async move { rx.recv().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.submit(42u32, 0).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, Some(42));
        assert_eq!(tx.pending(), 0);
    }

    #[tokio::test]
    async fn dropped_recv_future_loses_nothing() {
        let (tx, mut rx) = channel();

        let timed_out = tokio::time::timeout(Duration::from_millis(20), rx.recv()).await;
        assert!(timed_out.is_err());

        tx.submit("kept", 1).unwrap();
        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some("kept"));
    }

    #[tokio::test]
    async fn submit_after_close_is_rejected() {
        let (tx, _rx) = channel();
        tx.close();
        assert!(tx.is_closed());

        let err = tx.submit(7u8, 0).unwrap_err();
        assert_eq!(err.into_inner(), 7);
    }

    #[tokio::test]
    async fn close_discards_buffered_items() {
        let (tx, mut rx) = channel();
        for i in 0..5 {
            tx.submit(i, i).unwrap();
        }
        rx.close();

        assert_eq!(rx.recv().await, None);
        assert_eq!(tx.pending(), 0);
    }

    #[tokio::test]
    async fn close_wakes_parked_consumer() {
        let (tx, mut rx) = channel::<u8>();
        let consumer = tokio::spawn(async move { rx.recv().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.close();

        let received = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn dropping_every_sender_closes_relay() {
        let (tx, mut rx) = channel::<u8>();
        let second = tx.clone();
        drop(tx);
        drop(second);

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, None);
        assert!(rx.is_closed());
    }

    #[tokio::test]
    async fn dropping_receiver_closes_relay() {
        let (tx, rx) = channel();
        drop(rx);

        for _ in 0..200 {
            if tx.submit(1u8, 0).is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("relay stayed open after receiver was dropped");
    }
}
