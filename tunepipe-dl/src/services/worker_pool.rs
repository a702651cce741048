//! Bounded pool of pipeline workers
//!
//! `pool_size` workers pull accepted jobs from a queue holding at most
//! `queue_capacity` entries. Submission reserves a queue slot before the job
//! record exists, so a saturated pool rejects work without leaving an
//! orphaned Pending job behind. The insert and the enqueue run together on
//! their own task, so a caller that goes away mid-submit cannot strand a
//! row that no worker will ever see.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::job_orchestrator::{JobOrchestrator, PANIC_ERROR};
use crate::error::PipelineError;
use crate::models::DownloadJob;

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Every worker is busy and the queue is full
    #[error("Download queue is full ({0} jobs waiting)")]
    Overloaded(usize),

    /// Workers have stopped
    #[error("Worker pool is shut down")]
    Closed,

    /// Submission task panicked or was cancelled at shutdown
    #[error("Job submission aborted: {0}")]
    Aborted(String),

    /// Job record could not be created
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Handle for submitting jobs; clones share the same pool
#[derive(Clone)]
pub struct WorkerPool {
    sender: mpsc::Sender<DownloadJob>,
    orchestrator: Arc<JobOrchestrator>,
    pool_size: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    /// Spawn the workers
    ///
    /// Must be called within a tokio runtime. Workers exit once every
    /// `WorkerPool` handle is dropped and the queue has drained.
    pub fn start(
        pool_size: usize,
        queue_capacity: usize,
        orchestrator: Arc<JobOrchestrator>,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..pool_size)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&orchestrator),
                ))
            })
            .collect();

        tracing::info!(pool_size, queue_capacity, "Worker pool started");

        (
            Self {
                sender,
                orchestrator,
                pool_size,
                queue_capacity,
            },
            workers,
        )
    }

    /// Accept a download of `track_id`
    ///
    /// Returns the created Pending job immediately; the pipeline runs on a
    /// worker.
    pub async fn submit(&self, track_id: &str) -> Result<DownloadJob, SubmitError> {
        let permit = self.sender.clone().try_reserve_owned().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Overloaded(self.queue_capacity),
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })?;

        let orchestrator = Arc::clone(&self.orchestrator);
        let track_id = track_id.to_string();
        let enqueue = tokio::spawn(async move {
            let job = orchestrator.create_job(&track_id).await?;
            permit.send(job.clone());
            Ok::<_, SubmitError>(job)
        });

        enqueue
            .await
            .map_err(|e| SubmitError::Aborted(e.to_string()))?
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Jobs accepted but not yet picked up by a worker
    pub fn queued(&self) -> usize {
        self.queue_capacity.saturating_sub(self.sender.capacity())
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DownloadJob>>>,
    orchestrator: Arc<JobOrchestrator>,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };
        let job_id = job.uuid;

        tracing::debug!(worker_id, job_id = %job_id, "Worker picked up job");

        let task_orchestrator = Arc::clone(&orchestrator);
        let handle = tokio::spawn(async move { task_orchestrator.run_job(job).await });

        if let Err(e) = handle.await {
            tracing::error!(worker_id, job_id = %job_id, error = %e, "Pipeline task aborted");
            orchestrator.fail_abandoned(job_id, PANIC_ERROR).await;
        }
    }

    tracing::debug!(worker_id, "Worker stopped");
}
