//! Background dispatch queue.
//!
//! [`DispatchQueue`] is the deferral seam: executions that cross the
//! dispatch policy's threshold are handed off as a [`QueuedJob`] and the
//! HTTP caller returns immediately. [`TokioDispatchQueue`] backs the seam
//! with an unbounded mpsc channel drained by [`QueueWorker`], a long-lived
//! task in the server process.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{BulkSendRequest, CampaignEngine};
use meridian_core::types::DbId;

/// One deferred unit of work.
#[derive(Debug, Clone)]
pub enum QueuedJob {
    /// Dispatch (or continue dispatching) a campaign's targets.
    Campaign { campaign_id: DbId },
    /// Run an ad-hoc bulk send that was too large for inline execution.
    Bulk { request: BulkSendRequest },
}

/// Error type for enqueue failures.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The worker side of the queue has shut down.
    #[error("Dispatch queue is closed")]
    Closed,
}

/// Deferral seam for campaign and bulk dispatch work.
pub trait DispatchQueue: Send + Sync {
    /// Hand a job to the background worker.
    fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError>;
}

/// mpsc-backed [`DispatchQueue`].
pub struct TokioDispatchQueue {
    tx: mpsc::UnboundedSender<QueuedJob>,
}

impl TokioDispatchQueue {
    /// Create the queue, returning the receiver to hand to
    /// [`QueueWorker::run`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DispatchQueue for TokioDispatchQueue {
    fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        self.tx.send(job).map_err(|_| QueueError::Closed)
    }
}

/// Drains the dispatch queue, one job at a time.
///
/// Jobs run sequentially so a single worker never fans out past the
/// per-campaign throttle. Job failures are logged and do not stop the
/// loop.
pub struct QueueWorker;

impl QueueWorker {
    /// Run the worker loop until the queue closes or `cancel` fires.
    pub async fn run(
        engine: Arc<CampaignEngine>,
        mut receiver: mpsc::UnboundedReceiver<QueuedJob>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Dispatch queue worker started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Dispatch queue worker shutting down");
                    break;
                }
                job = receiver.recv() => {
                    match job {
                        Some(job) => {
                            if let Err(e) = engine.process_job(job).await {
                                tracing::error!(error = %e, "Queued dispatch job failed");
                            }
                        }
                        None => {
                            tracing::info!("Dispatch queue closed, worker exiting");
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_fails_after_receiver_drops() {
        let (queue, rx) = TokioDispatchQueue::new();
        drop(rx);
        let err = queue
            .enqueue(QueuedJob::Campaign { campaign_id: 1 })
            .unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }

    #[tokio::test]
    async fn enqueued_jobs_arrive_in_order() {
        let (queue, mut rx) = TokioDispatchQueue::new();
        queue
            .enqueue(QueuedJob::Campaign { campaign_id: 1 })
            .unwrap();
        queue
            .enqueue(QueuedJob::Campaign { campaign_id: 2 })
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, QueuedJob::Campaign { campaign_id: 1 }));
        assert!(matches!(second, QueuedJob::Campaign { campaign_id: 2 }));
    }
}
