//! Background job handlers.

use async_trait::async_trait;
use tessera_core::models::Job;
use tessera_core::{context, AppError};
use tessera_db::entity::CUSTOMERS;
use tessera_db::{Gate, Predicate};
use tessera_worker::JobHandler;

pub const CUSTOMER_EXPORT_KIND: &str = "customer_export";

/// Export the enqueuing tenant's customers. The handler reads through the
/// gate under the restored context, so it only ever sees that tenant's
/// records.
pub struct CustomerExportHandler {
    gate: Gate,
}

impl CustomerExportHandler {
    pub fn new(gate: Gate) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl JobHandler for CustomerExportHandler {
    fn kind(&self) -> &'static str {
        CUSTOMER_EXPORT_KIND
    }

    async fn handle(&self, job: &Job) -> Result<(), AppError> {
        let ctx = context::require()?;
        let customers = self.gate.find(&CUSTOMERS, &Predicate::All).await?;
        tracing::info!(
            job_id = %job.id,
            tenant_id = ?ctx.tenant_id,
            count = customers.len(),
            "customer export completed"
        );
        Ok(())
    }
}
