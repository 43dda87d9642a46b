//! Document code rules.
//!
//! A rule is an ordered list of components rendered left to right:
//! literals verbatim, dates in the tenant's timezone, and exactly one
//! counter whose scope is the rendered prefix before it. Example rendered
//! code: `INV-2026-000042`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// When a counter restarts from its start value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    Never,
    Daily,
    Monthly,
    Yearly,
}

/// One component of a code rule. Serialized externally tagged:
/// `{"literal": "INV-"}`, `{"date": "YYYY"}`,
/// `{"counter": {"width": 6, "start": 1, "step": 1, "reset": "yearly"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleComponent {
    Literal(String),
    Date(String),
    Counter {
        width: u8,
        start: u64,
        step: u64,
        reset: ResetPolicy,
    },
}

/// Supported date tokens, expanded in the tenant's timezone.
const DATE_TOKENS: &[&str] = &["YYYY", "YY", "MM", "DD"];

/// A per-tenant, per-entity rule describing how document codes are built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Entity the rule applies to, e.g. "invoice".
    pub entity: String,
    pub components: Vec<RuleComponent>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeRule {
    /// Index of the counter component. Valid rules have exactly one.
    pub fn counter_index(&self) -> Option<usize> {
        self.components
            .iter()
            .position(|c| matches!(c, RuleComponent::Counter { .. }))
    }

    /// Structural validation, applied on create and update.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.entity.trim().is_empty() {
            return Err(AppError::Validation("rule entity must not be empty".into()));
        }
        if self.components.is_empty() {
            return Err(AppError::Validation(
                "rule must have at least one component".into(),
            ));
        }

        let counters = self
            .components
            .iter()
            .filter(|c| matches!(c, RuleComponent::Counter { .. }))
            .count();
        if counters != 1 {
            return Err(AppError::Validation(format!(
                "rule must have exactly one counter component, found {}",
                counters
            )));
        }

        for component in &self.components {
            match component {
                RuleComponent::Literal(text) => {
                    if text.is_empty() {
                        return Err(AppError::Validation(
                            "literal component must not be empty".into(),
                        ));
                    }
                }
                RuleComponent::Date(format) => {
                    if !DATE_TOKENS.contains(&format.as_str()) {
                        return Err(AppError::Validation(format!(
                            "unsupported date token '{}', expected one of {:?}",
                            format, DATE_TOKENS
                        )));
                    }
                }
                RuleComponent::Counter { width, step, .. } => {
                    if *width == 0 || *width > 12 {
                        return Err(AppError::Validation(
                            "counter width must be between 1 and 12".into(),
                        ));
                    }
                    if *step == 0 {
                        return Err(AppError::Validation(
                            "counter step must be at least 1".into(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}
