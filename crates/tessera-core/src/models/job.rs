use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::TenantContext;

use super::ActorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// The identity snapshot captured when a job is enqueued. The worker
/// re-establishes a tenant context from this envelope before dispatching,
/// so handlers see the same isolation guarantees as request code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub tenant_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub actor_kind: ActorKind,
    pub request_id: String,
}

impl JobEnvelope {
    pub fn from_context(ctx: &TenantContext) -> Self {
        Self {
            tenant_id: ctx.tenant_id,
            actor_id: ctx.actor_id,
            actor_kind: ctx.actor_kind,
            request_id: ctx.request_id.clone(),
        }
    }

    pub fn to_context(&self) -> TenantContext {
        TenantContext {
            tenant_id: self.tenant_id,
            actor_id: self.actor_id,
            actor_kind: self.actor_kind,
            request_id: self.request_id.clone(),
        }
    }
}

/// A queued unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: String,
    pub status: JobStatus,
    pub envelope: JobEnvelope,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
