//! Job queue.
//!
//! Jobs live in the store as global records. Claiming is atomic in the
//! backend, so multiple worker processes can poll the same queue. Failed
//! jobs are retried with exponential backoff up to a bounded attempt count.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tessera_core::models::{Job, JobEnvelope, JobStatus};
use tessera_core::{context, AppError};
use tessera_db::entity::JOBS;
use tessera_db::record::Record;
use tessera_db::store::{Scope, StoreBackend};
use tokio::sync::watch;
use uuid::Uuid;

use crate::handler::JobHandler;

#[derive(Clone, Debug)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub max_retries: i32,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            max_retries: 3,
        }
    }
}

pub struct JobQueue {
    store: Arc<dyn StoreBackend>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    config: JobQueueConfig,
}

impl JobQueue {
    pub fn new(store: Arc<dyn StoreBackend>, config: JobQueueConfig) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            config,
        }
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Enqueue a job under the caller's context. The identity envelope is
    /// captured here, at the enqueue point, never at dispatch.
    pub async fn enqueue(&self, kind: &str, payload: Value) -> Result<Job, AppError> {
        self.enqueue_at(kind, payload, Utc::now()).await
    }

    pub async fn enqueue_at(
        &self,
        kind: &str,
        payload: Value,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Job, AppError> {
        let ctx = context::require()?;
        let envelope = JobEnvelope::from_context(&ctx);
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            status: JobStatus::Pending,
            envelope: envelope.clone(),
            payload,
            attempts: 0,
            max_retries: self.config.max_retries,
            last_error: None,
            scheduled_at,
            created_at: now,
            updated_at: now,
        };
        let record = Record::from_model(job.id, envelope.tenant_id, &job)?;
        self.store.insert(&JOBS, record).await?;
        tracing::debug!(job_id = %job.id, kind = kind, "job enqueued");
        Ok(job)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Job>, AppError> {
        self.store
            .get(&JOBS, Scope::global(), id)
            .await?
            .as_ref()
            .map(Record::to_model)
            .transpose()
    }

    /// Cancel a job that has not started. Running jobs are not interrupted.
    pub async fn cancel(&self, id: Uuid) -> Result<Job, AppError> {
        let mut job = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("jobs {}", id)))?;
        if job.status != JobStatus::Pending {
            return Err(AppError::Validation(format!(
                "job is {} and cannot be cancelled",
                job.status.as_str()
            )));
        }
        job.status = JobStatus::Cancelled;
        job.updated_at = Utc::now();
        self.persist(&job).await?;
        Ok(job)
    }

    async fn persist(&self, job: &Job) -> Result<(), AppError> {
        self.store
            .update(&JOBS, Scope::global(), job.id, serde_json::to_value(job)?)
            .await?
            .ok_or_else(|| AppError::Internal(format!("job {} vanished", job.id)))?;
        Ok(())
    }

    /// Claim and process one due job. Returns false when the queue was idle.
    pub async fn tick(&self) -> Result<bool, AppError> {
        let Some(record) = self.store.claim_due_job(Utc::now()).await? else {
            return Ok(false);
        };
        // The claim flipped the stored status; reflect it in the model.
        let mut job: Job = record.to_model()?;
        job.status = JobStatus::Running;
        job.attempts += 1;
        self.persist(&job).await?;

        let outcome = self.dispatch(&job).await;
        match outcome {
            Ok(()) => {
                job.status = JobStatus::Completed;
                job.last_error = None;
                tracing::info!(job_id = %job.id, kind = %job.kind, "job completed");
            }
            Err(err) => {
                job.last_error = Some(err.to_string());
                if job.attempts >= job.max_retries {
                    job.status = JobStatus::Failed;
                    tracing::error!(
                        job_id = %job.id,
                        kind = %job.kind,
                        attempts = job.attempts,
                        error = %err,
                        "job failed permanently"
                    );
                } else {
                    job.status = JobStatus::Pending;
                    let backoff = ChronoDuration::seconds(1i64 << job.attempts.min(10));
                    job.scheduled_at = Utc::now() + backoff;
                    tracing::warn!(
                        job_id = %job.id,
                        kind = %job.kind,
                        attempts = job.attempts,
                        error = %err,
                        "job failed, retrying"
                    );
                }
            }
        }
        job.updated_at = Utc::now();
        self.persist(&job).await?;
        Ok(true)
    }

    async fn dispatch(&self, job: &Job) -> Result<(), AppError> {
        let handler = self
            .handlers
            .get(job.kind.as_str())
            .ok_or_else(|| AppError::Internal(format!("no handler for job kind '{}'", job.kind)))?
            .clone();
        // Restore the enqueuer's context for the duration of the handler.
        context::scope(job.envelope.to_context(), handler.handle(job)).await?
    }

    /// Run the polling loop until `shutdown` flips to true. One claim per
    /// worker per poll; idle workers sleep for the poll interval.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut workers = Vec::with_capacity(self.config.max_workers);
        for worker_id in 0..self.config.max_workers {
            let queue = self.clone();
            let mut shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move {
                let poll = std::time::Duration::from_millis(queue.config.poll_interval_ms);
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    match queue.tick().await {
                        Ok(true) => {}
                        Ok(false) => {
                            tokio::select! {
                                _ = tokio::time::sleep(poll) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                        Err(err) => {
                            tracing::error!(worker_id, error = %err, "queue tick failed");
                            tokio::time::sleep(poll).await;
                        }
                    }
                }
            }));
        }
        let _ = shutdown.changed().await;
        for worker in workers {
            let _ = worker.await;
        }
    }
}
