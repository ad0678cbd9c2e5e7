//! Hand-off between the executor client and the worker pool.
//!
//! The client pushes `WorkItem`s into a bounded channel; the depot's workers
//! pull them out, perform the step sequence, and report to the callback
//! address. Capacity is bounded and sends wait at most `send_timeout`; a
//! saturated depot surfaces as `DispatchError::Timeout` for the caller.

pub mod callback;
mod worker;

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::model::Registration;
use crate::sequence::{ResultReader, StepSequence};

pub use callback::{CallbackError, CallbackSender, HttpCallbackSender};
pub use worker::{Depot, DepotHandle};

/// One accepted run, owned by whichever worker receives it.
#[derive(Debug)]
pub struct WorkItem {
    pub complete_url: String,
    pub registration: Registration,
    pub sequence: StepSequence,
    pub result: ResultReader,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatch queue full for {0:?}")]
    Timeout(Duration),

    #[error("dispatch queue closed")]
    Closed,
}

/// Send half of the dispatch channel.
#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<WorkItem>,
    send_timeout: Duration,
}

impl DispatchSender {
    pub async fn dispatch(&self, item: WorkItem) -> Result<(), DispatchError> {
        self.tx
            .send_timeout(item, self.send_timeout)
            .await
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => DispatchError::Timeout(self.send_timeout),
                SendTimeoutError::Closed(_) => DispatchError::Closed,
            })
    }
}

/// Receive half of the dispatch channel.
#[derive(Debug)]
pub struct DispatchReceiver {
    rx: mpsc::Receiver<WorkItem>,
}

impl DispatchReceiver {
    pub async fn recv(&mut self) -> Option<WorkItem> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<WorkItem> {
        self.rx.try_recv().ok()
    }

    /// Number of items waiting in the channel.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create a bounded dispatch channel. `capacity` must be non-zero.
pub fn dispatch_channel(capacity: usize, send_timeout: Duration) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (DispatchSender { tx, send_timeout }, DispatchReceiver { rx })
}
