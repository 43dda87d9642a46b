use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_core::AppError;
use uuid::Uuid;

/// A stored record in gate-neutral form. `data` holds the entity payload as
/// a JSON object; typed repositories convert to and from domain models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub removed_at: Option<DateTime<Utc>>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(id: Uuid, tenant_id: Option<Uuid>, data: Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id,
            removed_at: None,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    /// Serialize a domain model into a record payload. Fails on models that
    /// do not serialize to a JSON object.
    pub fn from_model<T: Serialize>(
        id: Uuid,
        tenant_id: Option<Uuid>,
        model: &T,
    ) -> Result<Self, AppError> {
        let data = serde_json::to_value(model)?;
        if !data.is_object() {
            return Err(AppError::Internal(
                "record payload must be a JSON object".to_string(),
            ));
        }
        Ok(Self::new(id, tenant_id, data))
    }

    /// Deserialize the payload back into a domain model.
    pub fn to_model<T: for<'de> Deserialize<'de>>(&self) -> Result<T, AppError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Read a top-level string field from the payload.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}
