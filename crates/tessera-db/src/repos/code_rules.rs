use chrono::Utc;
use tessera_core::models::{CodeRule, RuleComponent};
use tessera_core::{context, AppError};
use uuid::Uuid;

use crate::entity::CODE_RULES;
use crate::gate::Gate;
use crate::predicate::Predicate;
use crate::record::Record;

/// Document code rules, gate-scoped. One active rule per entity per tenant.
#[derive(Clone)]
pub struct CodeRuleRepository {
    gate: Gate,
}

impl CodeRuleRepository {
    pub fn new(gate: Gate) -> Self {
        Self { gate }
    }

    pub async fn create(
        &self,
        entity: &str,
        components: Vec<RuleComponent>,
    ) -> Result<CodeRule, AppError> {
        let entity = entity.trim().to_lowercase();
        let now = Utc::now();
        let rule = CodeRule {
            id: Uuid::new_v4(),
            tenant_id: context::require_tenant_id()?,
            entity: entity.clone(),
            components,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        rule.validate()?;

        if self.active_for(&entity).await?.is_some() {
            return Err(AppError::UniqueConflict(format!(
                "an active code rule for '{}' already exists",
                entity
            )));
        }

        self.gate
            .create(&CODE_RULES, serde_json::to_value(&rule)?)
            .await?;
        Ok(rule)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CodeRule>, AppError> {
        self.gate
            .get(&CODE_RULES, id)
            .await?
            .as_ref()
            .map(Record::to_model)
            .transpose()
    }

    pub async fn list(&self) -> Result<Vec<CodeRule>, AppError> {
        self.gate
            .find(&CODE_RULES, &Predicate::All)
            .await?
            .iter()
            .map(Record::to_model)
            .collect()
    }

    /// The active rule for an entity, if any.
    pub async fn active_for(&self, entity: &str) -> Result<Option<CodeRule>, AppError> {
        self.gate
            .find_one(
                &CODE_RULES,
                &Predicate::and(vec![
                    Predicate::eq("entity", entity),
                    Predicate::eq("is_active", true),
                ]),
            )
            .await?
            .as_ref()
            .map(Record::to_model)
            .transpose()
    }

    /// Replace a rule's components. Codes already issued are unaffected.
    pub async fn update_components(
        &self,
        id: Uuid,
        components: Vec<RuleComponent>,
    ) -> Result<CodeRule, AppError> {
        let record = self.gate.get_required(&CODE_RULES, id).await?;
        let mut rule: CodeRule = record.to_model()?;
        rule.components = components;
        rule.updated_at = Utc::now();
        rule.validate()?;
        self.gate
            .update(&CODE_RULES, id, serde_json::to_value(&rule)?)
            .await?;
        Ok(rule)
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<CodeRule, AppError> {
        let record = self.gate.get_required(&CODE_RULES, id).await?;
        let mut rule: CodeRule = record.to_model()?;
        if is_active && !rule.is_active {
            if let Some(existing) = self.active_for(&rule.entity).await? {
                if existing.id != id {
                    return Err(AppError::UniqueConflict(format!(
                        "an active code rule for '{}' already exists",
                        rule.entity
                    )));
                }
            }
        }
        rule.is_active = is_active;
        rule.updated_at = Utc::now();
        self.gate
            .update(&CODE_RULES, id, serde_json::to_value(&rule)?)
            .await?;
        Ok(rule)
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        self.gate.remove(&CODE_RULES, id).await
    }
}
