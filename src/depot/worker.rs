// Worker pool consuming dispatched work items

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{CallbackSender, DispatchReceiver, WorkItem};
use crate::model::ContainerRunResult;

pub struct Depot;

pub struct DepotHandle {
    workers: Vec<JoinHandle<()>>,
}

impl Depot {
    /// Start `num_workers` workers sharing `receiver`.
    ///
    /// Workers exit once every `DispatchSender` has been dropped and the
    /// channel is drained.
    pub fn spawn(
        receiver: DispatchReceiver,
        callback: Arc<dyn CallbackSender>,
        num_workers: usize,
    ) -> DepotHandle {
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..num_workers)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let callback = callback.clone();
                tokio::spawn(async move {
                    Self::worker_loop(worker_id, receiver, callback).await;
                })
            })
            .collect();

        DepotHandle { workers }
    }

    async fn worker_loop(
        worker_id: usize,
        receiver: Arc<Mutex<DispatchReceiver>>,
        callback: Arc<dyn CallbackSender>,
    ) {
        info!("Depot worker {} started", worker_id);

        loop {
            let item = {
                let mut rx = receiver.lock().await;
                rx.recv().await
            };

            let Some(item) = item else {
                break;
            };

            Self::process(worker_id, item, callback.as_ref()).await;
        }

        info!("Depot worker {} stopped", worker_id);
    }

    /// Perform one work item and report its outcome.
    pub async fn process(worker_id: usize, item: WorkItem, callback: &dyn CallbackSender) {
        let WorkItem {
            complete_url,
            registration,
            mut sequence,
            result,
        } = item;
        let guid = registration.guid;

        debug!(worker_id, guid = %guid, steps = sequence.len(), "Performing sequence");
        let outcome = sequence.perform().await;
        // Dropping the sequence releases an unused result writer.
        drop(sequence);

        let run_result = match outcome {
            Ok(()) => ContainerRunResult {
                guid: guid.clone(),
                failed: false,
                failure_reason: String::new(),
                result: result.take(),
            },
            Err(err) => {
                warn!(worker_id, guid = %guid, error = %err, "Sequence failed");
                ContainerRunResult {
                    guid: guid.clone(),
                    failed: true,
                    failure_reason: err.to_string(),
                    result: result.take(),
                }
            }
        };

        match callback.deliver(&complete_url, &run_result).await {
            Ok(()) => info!(worker_id, guid = %guid, failed = run_result.failed, "Delivered run result"),
            Err(err) => error!(
                worker_id,
                guid = %guid,
                complete_url = %complete_url,
                error = %err,
                "Failed to deliver run result"
            ),
        }
    }
}

impl DepotHandle {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to stop.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(err) = worker.await {
                error!("Depot worker panicked: {}", err);
            }
        }
    }
}
