//! Background confirmation pipeline.
//!
//! [`ConfirmationWorker`] is a single long-lived task that drains a bounded
//! FIFO queue of order ids. For each id it waits a fixed delay and then moves
//! the order from `pending` to `confirmed`. [`ConfirmationClient`] is the
//! sending half handed to the service.
//!
//! When the bounded queue stays full past the caller's wait, the id goes to an
//! unbounded overflow queue instead. One forwarder task, started with the
//! worker, moves overflowed ids into the bounded queue as room frees up, so
//! every queued order is eventually confirmed and ids keep their FIFO order.
//!
//! Confirmation is a compare-and-set: an order that was deleted, or whose
//! status was changed by hand while it waited, is left alone. Nothing is
//! retried and no error ever leaves the loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::OrderStatus;
use crate::error::OrderError;
use crate::store::OrderStore;

/// What happened to one queued confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Confirmed,
    /// The order was no longer pending when its turn came.
    Skipped(OrderStatus),
    /// The order was deleted before its turn came.
    Vanished,
    Failed(OrderError),
}

/// Where [`ConfirmationClient::enqueue`] put an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Straight into the bounded queue.
    Queued,
    /// Into the overflow queue; the forwarder hands it on later.
    Deferred,
    /// Nobody will ever confirm it.
    WorkerStopped,
}

pub struct ConfirmationWorker {
    receiver: mpsc::Receiver<i64>,
    overflow: Option<Overflow>,
    store: Arc<dyn OrderStore>,
    delay: Duration,
}

impl ConfirmationWorker {
    pub fn new(
        buffer_size: usize,
        store: Arc<dyn OrderStore>,
        delay: Duration,
    ) -> (Self, ConfirmationClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (overflow_sender, overflow_receiver) = mpsc::unbounded_channel();
        let backlog = Arc::new(AtomicUsize::new(0));

        let worker = Self {
            receiver,
            overflow: Some(Overflow {
                receiver: overflow_receiver,
                sender: sender.clone(),
                backlog: backlog.clone(),
            }),
            store,
            delay,
        };
        let client = ConfirmationClient {
            sender,
            overflow: overflow_sender,
            backlog,
        };
        (worker, client)
    }

    /// Processes queued ids one at a time until every client has been dropped
    /// and both queues are empty.
    #[instrument(name = "confirmation_worker", skip(self))]
    pub async fn run(mut self) {
        info!(delay_ms = self.delay.as_millis() as u64, "Confirmation worker starting");

        let forwarder = self.overflow.take().map(|overflow| tokio::spawn(overflow.forward()));

        while let Some(order_id) = self.receiver.recv().await {
            debug!(order_id, "Waiting before confirmation");
            tokio::time::sleep(self.delay).await;
            self.confirm(order_id).await;
        }

        // the queue only closes once the forwarder has dropped its sender
        if let Some(forwarder) = forwarder {
            if let Err(e) = forwarder.await {
                error!(error = ?e, "Overflow forwarder ended abnormally");
            }
        }

        info!("Confirmation worker stopped");
    }

    #[instrument(skip(self))]
    async fn confirm(&self, order_id: i64) -> ConfirmationOutcome {
        let outcome = match self
            .store
            .transition_status(order_id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
        {
            Ok(Some(_)) => ConfirmationOutcome::Confirmed,
            Ok(None) => {
                let current = self.store.get_by_id(order_id).await.map(|o| o.status);
                match current {
                    Ok(status) => ConfirmationOutcome::Skipped(status),
                    Err(OrderError::NotFound(_)) => ConfirmationOutcome::Vanished,
                    Err(e) => ConfirmationOutcome::Failed(e),
                }
            }
            Err(OrderError::NotFound(_)) => ConfirmationOutcome::Vanished,
            Err(e) => ConfirmationOutcome::Failed(e),
        };

        match &outcome {
            ConfirmationOutcome::Confirmed => info!("Order automatically confirmed"),
            ConfirmationOutcome::Skipped(status) => {
                info!(status = %status, "Order no longer pending, confirmation skipped")
            }
            ConfirmationOutcome::Vanished => warn!("Order vanished before confirmation"),
            ConfirmationOutcome::Failed(e) => error!(error = %e, "Failed to auto-confirm order"),
        }

        outcome
    }
}

/// Receiving end of the overflow queue plus a handle on the bounded one.
struct Overflow {
    receiver: mpsc::UnboundedReceiver<i64>,
    sender: mpsc::Sender<i64>,
    backlog: Arc<AtomicUsize>,
}

impl Overflow {
    /// Ends when every client is gone and the overflow is drained.
    #[instrument(name = "confirmation_overflow", skip(self))]
    async fn forward(mut self) {
        while let Some(order_id) = self.receiver.recv().await {
            let sent = self.sender.send(order_id).await;
            self.backlog.fetch_sub(1, Ordering::SeqCst);
            if sent.is_err() {
                error!(order_id, "Confirmation worker is gone, dropping overflow");
                break;
            }
            debug!(order_id, "Overflowed order handed to the worker");
        }
    }
}

/// Sending half of the confirmation queue.
#[derive(Clone)]
pub struct ConfirmationClient {
    sender: mpsc::Sender<i64>,
    overflow: mpsc::UnboundedSender<i64>,
    backlog: Arc<AtomicUsize>,
}

impl ConfirmationClient {
    /// Queues `order_id`, waiting at most `max_wait` for room in the bounded
    /// queue before handing it to the overflow queue.
    ///
    /// While the overflow holds ids, new ids go straight behind them so the
    /// worker still sees them in enqueue order.
    #[instrument(skip(self))]
    pub async fn enqueue(&self, order_id: i64, max_wait: Duration) -> Enqueued {
        if self.backlog.load(Ordering::SeqCst) == 0 {
            match self.sender.send_timeout(order_id, max_wait).await {
                Ok(()) => {
                    debug!("Order queued for confirmation");
                    return Enqueued::Queued;
                }
                Err(SendTimeoutError::Closed(_)) => {
                    error!("Confirmation worker is not running, order will stay pending");
                    return Enqueued::WorkerStopped;
                }
                Err(SendTimeoutError::Timeout(_)) => {}
            }
        }
        self.defer(order_id)
    }

    fn defer(&self, order_id: i64) -> Enqueued {
        let backlog = self.backlog.fetch_add(1, Ordering::SeqCst) + 1;
        if self.overflow.send(order_id).is_err() {
            self.backlog.fetch_sub(1, Ordering::SeqCst);
            error!("Confirmation worker is not running, order will stay pending");
            return Enqueued::WorkerStopped;
        }
        warn!(backlog, "Confirmation queue full, order deferred to overflow");
        Enqueued::Deferred
    }

    /// Ids waiting in the overflow queue.
    #[cfg(test)]
    fn backlog(&self) -> usize {
        self.backlog.load(Ordering::SeqCst)
    }
}
