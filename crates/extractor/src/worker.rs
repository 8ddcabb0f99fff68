//! Extraction worker pool
//!
//! A bounded in-process job queue feeding N concurrent workers. Upload
//! handlers enqueue by document id and return immediately; image and video
//! handlers may additionally wait (bounded) on a completion signal to
//! answer with inline results. There is no global registry: the queue
//! handle is the only way in, and completion flows back over a channel.

use crate::pipeline::{ExtractionPipeline, JobOutcome};
use metrics::gauge;
use quarry_common::errors::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

const QUEUE_DEPTH_GAUGE: &str = "quarry_extraction_queue_depth";

/// One unit of work for the pool
pub struct ExtractionJob {
    pub document_id: Uuid,
    /// Completion signal for callers waiting on inline results
    pub notify: Option<oneshot::Sender<JobOutcome>>,
}

/// Cloneable handle for enqueueing extraction jobs
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<ExtractionJob>,
}

impl JobQueue {
    /// Enqueue a job without waiting for its result
    pub fn enqueue(&self, document_id: Uuid) -> Result<(), AppError> {
        self.submit(ExtractionJob {
            document_id,
            notify: None,
        })
    }

    /// Enqueue a job and wait up to `wait` for its outcome.
    ///
    /// `None` means the job is still running (or the pool shut down before
    /// answering); the document keeps processing asynchronously either way.
    pub async fn enqueue_and_wait(
        &self,
        document_id: Uuid,
        wait: Duration,
    ) -> Result<Option<JobOutcome>, AppError> {
        let (tx, rx) = oneshot::channel();
        self.submit(ExtractionJob {
            document_id,
            notify: Some(tx),
        })?;

        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(outcome)) => Ok(Some(outcome)),
            Ok(Err(_)) | Err(_) => Ok(None),
        }
    }

    fn submit(&self, job: ExtractionJob) -> Result<(), AppError> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AppError::QueueError {
                message: "extraction queue is full".to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => AppError::QueueError {
                message: "extraction workers are not running".to_string(),
            },
        })?;

        gauge!(QUEUE_DEPTH_GAUGE).increment(1.0);
        Ok(())
    }
}

/// The running worker pool
pub struct ExtractionPool {
    dispatcher: JoinHandle<()>,
}

impl ExtractionPool {
    /// Start the pool: a dispatcher pulling from the bounded queue plus up
    /// to `workers` concurrently running jobs.
    pub fn start(
        pipeline: Arc<ExtractionPipeline>,
        workers: usize,
        queue_depth: usize,
    ) -> (JobQueue, Self) {
        let (sender, mut receiver) = mpsc::channel::<ExtractionJob>(queue_depth.max(1));
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));

        let dispatcher = tokio::spawn(async move {
            info!(workers, queue_depth, "Extraction pool started");

            while let Some(job) = receiver.recv().await {
                gauge!(QUEUE_DEPTH_GAUGE).decrement(1.0);

                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    let outcome = pipeline.process(job.document_id).await;
                    if let Some(notify) = job.notify {
                        // The waiter may have timed out and gone away
                        let _ = notify.send(outcome);
                    }
                    drop(permit);
                });
            }

            info!("Extraction pool draining: queue closed");
        });

        (JobQueue { sender }, Self { dispatcher })
    }

    /// Wait for the dispatcher to finish (after all queue handles dropped)
    pub async fn join(self) {
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "Extraction dispatcher ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_on_closed_pool_is_a_queue_error() {
        let (sender, receiver) = mpsc::channel(4);
        drop(receiver);
        let queue = JobQueue { sender };

        let err = queue.enqueue(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::QueueError { .. }));
    }

    #[tokio::test]
    async fn test_full_queue_rejects_instead_of_blocking() {
        let (sender, _receiver) = mpsc::channel(1);
        let queue = JobQueue { sender };

        queue.enqueue(Uuid::new_v4()).unwrap();
        let err = queue.enqueue(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::QueueError { .. }));
    }

    #[tokio::test]
    async fn test_wait_returns_outcome_from_worker() {
        let (sender, mut receiver) = mpsc::channel::<ExtractionJob>(4);
        let queue = JobQueue { sender };

        // Stand-in worker answering every job
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                if let Some(notify) = job.notify {
                    let _ = notify.send(JobOutcome::Completed);
                }
            }
        });

        let outcome = queue
            .enqueue_and_wait(Uuid::new_v4(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, Some(JobOutcome::Completed));
    }

    #[tokio::test]
    async fn test_wait_times_out_to_none() {
        let (sender, _receiver) = mpsc::channel::<ExtractionJob>(4);
        let queue = JobQueue { sender };

        let outcome = queue
            .enqueue_and_wait(Uuid::new_v4(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(outcome, None);
    }
}
