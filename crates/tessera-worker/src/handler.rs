use async_trait::async_trait;
use tessera_core::models::Job;
use tessera_core::AppError;

/// A processor for one kind of job. `handle` runs inside the tenant context
/// restored from the job's envelope; data access through the gate is
/// filtered exactly as it was for the request that enqueued the job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn handle(&self, job: &Job) -> Result<(), AppError>;
}
