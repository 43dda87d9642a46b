//! Document code allocation.
//!
//! Codes are rendered from a tenant's rule: literals, dates in the tenant's
//! timezone, and one padded counter. The counter row is keyed by the
//! rendered prefix plus the reset period, so a yearly counter restarts when
//! the year changes and two rules with distinct prefixes never collide.
//! Allocation retries a bounded number of times under write contention.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use tessera_core::models::{CodeRule, ResetPolicy, RuleComponent};
use tessera_core::{context, AppError};

use crate::store::StoreBackend;

pub struct CodeAllocator {
    store: Arc<dyn StoreBackend>,
    retry_attempts: u32,
}

impl CodeAllocator {
    pub fn new(store: Arc<dyn StoreBackend>, retry_attempts: u32) -> Self {
        Self {
            store,
            retry_attempts: retry_attempts.max(1),
        }
    }

    /// Allocate the next code for `rule`, using the current time in the
    /// tenant's timezone.
    pub async fn allocate(&self, rule: &CodeRule, timezone: &str) -> Result<String, AppError> {
        self.allocate_at(rule, timezone, Utc::now()).await
    }

    pub async fn allocate_at(
        &self,
        rule: &CodeRule,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let tenant = context::require_tenant_id()?;
        if tenant != rule.tenant_id {
            return Err(AppError::TenantMismatch);
        }
        rule.validate()?;
        if !rule.is_active {
            return Err(AppError::Validation(format!(
                "code rule for '{}' is inactive",
                rule.entity
            )));
        }

        let tz: Tz = timezone
            .parse()
            .map_err(|_| AppError::Validation(format!("unknown timezone '{}'", timezone)))?;
        let local = now.with_timezone(&tz);

        let counter_index = rule
            .counter_index()
            .ok_or_else(|| AppError::Validation("rule has no counter component".to_string()))?;
        let RuleComponent::Counter {
            width,
            start,
            step,
            reset,
        } = rule.components[counter_index]
        else {
            return Err(AppError::Internal("counter index out of sync".to_string()));
        };

        let prefix: String = rule.components[..counter_index]
            .iter()
            .map(|c| render_static(c, &local))
            .collect();
        let suffix: String = rule.components[counter_index + 1..]
            .iter()
            .map(|c| render_static(c, &local))
            .collect();
        let scope_key = format!("{}|{}", prefix, period_tag(reset, &local));

        let mut last_err = None;
        for attempt in 0..self.retry_attempts {
            match self
                .store
                .next_sequence(tenant, &rule.entity, &scope_key, start, step)
                .await
            {
                Ok(value) => {
                    let counter = format!("{:0width$}", value, width = width as usize);
                    return Ok(format!("{}{}{}", prefix, counter, suffix));
                }
                Err(AppError::AllocatorContention(msg)) => {
                    last_err = Some(msg);
                    tokio::time::sleep(Duration::from_millis(10 * (attempt as u64 + 1))).await;
                }
                Err(other) => return Err(other),
            }
        }
        Err(AppError::AllocatorContention(format!(
            "gave up after {} attempts: {}",
            self.retry_attempts,
            last_err.unwrap_or_default()
        )))
    }
}

fn render_static(component: &RuleComponent, local: &DateTime<Tz>) -> String {
    match component {
        RuleComponent::Literal(text) => text.clone(),
        RuleComponent::Date(token) => match token.as_str() {
            "YYYY" => local.format("%Y").to_string(),
            "YY" => local.format("%y").to_string(),
            "MM" => local.format("%m").to_string(),
            "DD" => local.format("%d").to_string(),
            // validate() rejects anything else before we get here
            other => other.to_string(),
        },
        RuleComponent::Counter { .. } => String::new(),
    }
}

fn period_tag(reset: ResetPolicy, local: &DateTime<Tz>) -> String {
    match reset {
        ResetPolicy::Never => String::new(),
        ResetPolicy::Yearly => format!("{:04}", local.year()),
        ResetPolicy::Monthly => format!("{:04}-{:02}", local.year(), local.month()),
        ResetPolicy::Daily => format!("{:04}-{:02}-{:02}", local.year(), local.month(), local.day()),
    }
}
