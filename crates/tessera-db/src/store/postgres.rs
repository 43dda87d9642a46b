//! PostgreSQL store backend.
//!
//! One table per declared entity (`id`, `tenant_id`, `removed_at`, `data`
//! jsonb, timestamps) plus a `code_sequences` counter table. Predicates are
//! compiled to parameterized jsonb comparisons; entity names come from the
//! static registry and are never user input.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tessera_core::AppError;
use uuid::Uuid;

use crate::entity::EntityDef;
use crate::predicate::Predicate;
use crate::record::Record;

use super::{Scope, StoreBackend};

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {}", e)))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            // unique_violation
            Some("23505") => return AppError::UniqueConflict(db.message().to_string()),
            // serialization_failure, deadlock_detected, lock_not_available
            Some("40001") | Some("40P01") | Some("55P03") => {
                return AppError::AllocatorContention(db.message().to_string())
            }
            _ => {}
        }
    }
    if matches!(err, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) {
        return AppError::Unavailable(format!("database unavailable: {}", err));
    }
    AppError::Internal(format!("database error: {}", err))
}

fn record_from_row(row: &PgRow) -> Result<Record, AppError> {
    Ok(Record {
        id: row.try_get("id").map_err(db_err)?,
        tenant_id: row.try_get("tenant_id").map_err(db_err)?,
        removed_at: row.try_get("removed_at").map_err(db_err)?,
        data: row.try_get("data").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

/// Append the scope conditions to a WHERE clause already holding one term.
fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, entity: &EntityDef, scope: Scope) {
    if let Some(tenant) = scope.tenant {
        qb.push(" AND tenant_id = ");
        qb.push_bind(tenant);
    }
    if !scope.include_removed && entity.soft_delete {
        qb.push(" AND removed_at IS NULL");
    }
}

fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::All => {
            qb.push("TRUE");
        }
        Predicate::Eq(field, value) => {
            qb.push("data -> ");
            qb.push_bind(field.clone());
            qb.push("::text = ");
            qb.push_bind(value.clone());
        }
        Predicate::Ne(field, value) => {
            qb.push("data -> ");
            qb.push_bind(field.clone());
            qb.push("::text IS DISTINCT FROM ");
            qb.push_bind(value.clone());
        }
        Predicate::In(field, values) => {
            qb.push("data -> ");
            qb.push_bind(field.clone());
            qb.push("::text = ANY(");
            qb.push_bind(values.clone());
            qb.push(")");
        }
        Predicate::Lt(field, value) => push_ordered(qb, field, value, "<"),
        Predicate::Gt(field, value) => push_ordered(qb, field, value, ">"),
        Predicate::Like(field, pattern) => {
            qb.push("data ->> ");
            qb.push_bind(field.clone());
            qb.push("::text LIKE ");
            qb.push_bind(pattern.clone());
        }
        Predicate::And(predicates) => push_composite(qb, predicates, " AND "),
        Predicate::Or(predicates) => push_composite(qb, predicates, " OR "),
    }
}

fn push_ordered(qb: &mut QueryBuilder<'_, Postgres>, field: &str, value: &Value, op: &str) {
    match value {
        Value::Number(n) => {
            qb.push("(data ->> ");
            qb.push_bind(field.to_string());
            qb.push("::text)::numeric ");
            qb.push(op);
            qb.push(" ");
            qb.push_bind(n.as_f64().unwrap_or(f64::NAN));
        }
        Value::String(s) => {
            qb.push("data ->> ");
            qb.push_bind(field.to_string());
            qb.push("::text ");
            qb.push(op);
            qb.push(" ");
            qb.push_bind(s.clone());
        }
        // Ordering over other JSON types never matches, same as in memory.
        _ => {
            qb.push("FALSE");
        }
    }
}

fn push_composite(qb: &mut QueryBuilder<'_, Postgres>, predicates: &[Predicate], joiner: &str) {
    if predicates.is_empty() {
        // Empty AND is vacuously true, empty OR matches nothing.
        qb.push(if joiner.contains("AND") { "TRUE" } else { "FALSE" });
        return;
    }
    qb.push("(");
    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_predicate(qb, predicate);
    }
    qb.push(")");
}

#[async_trait]
impl StoreBackend for PgBackend {
    async fn insert(
        &self,
        entity: &'static EntityDef,
        record: Record,
    ) -> Result<Record, AppError> {
        let sql = format!(
            "INSERT INTO {} (id, tenant_id, removed_at, data, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, tenant_id, removed_at, data, created_at, updated_at",
            entity.name
        );
        let row = sqlx::query(&sql)
            .bind(record.id)
            .bind(record.tenant_id)
            .bind(record.removed_at)
            .bind(&record.data)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        record_from_row(&row)
    }

    async fn get(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<Option<Record>, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT id, tenant_id, removed_at, data, created_at, updated_at FROM {} WHERE id = ",
            entity.name
        ));
        qb.push_bind(id);
        push_scope(&mut qb, entity, scope);
        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn find(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        predicate: &Predicate,
    ) -> Result<Vec<Record>, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT id, tenant_id, removed_at, data, created_at, updated_at FROM {} WHERE ",
            entity.name
        ));
        push_predicate(&mut qb, predicate);
        push_scope(&mut qb, entity, scope);
        qb.push(" ORDER BY created_at");
        let rows = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(record_from_row).collect()
    }

    async fn update(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
        data: Value,
    ) -> Result<Option<Record>, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET data = ", entity.name));
        qb.push_bind(data);
        qb.push(", updated_at = now() WHERE id = ");
        qb.push_bind(id);
        push_scope(&mut qb, entity, scope);
        qb.push(" RETURNING id, tenant_id, removed_at, data, created_at, updated_at");
        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn soft_remove(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "UPDATE {} SET removed_at = now(), updated_at = now() WHERE id = ",
            entity.name
        ));
        qb.push_bind(id);
        push_scope(&mut qb, entity, scope);
        let result = qb.build().execute(&self.pool).await.map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn hard_remove(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", entity.name));
        qb.push_bind(id);
        if let Some(tenant) = scope.tenant {
            qb.push(" AND tenant_id = ");
            qb.push_bind(tenant);
        }
        let result = qb.build().execute(&self.pool).await.map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn next_sequence(
        &self,
        tenant: Uuid,
        entity: &str,
        scope_key: &str,
        start: u64,
        step: u64,
    ) -> Result<u64, AppError> {
        // Single statement upsert keeps allocation atomic; concurrent callers
        // serialize on the row lock and each receive a distinct value.
        let row = sqlx::query(
            "INSERT INTO code_sequences (tenant_id, entity, scope_key, last_value) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tenant_id, entity, scope_key) \
             DO UPDATE SET last_value = code_sequences.last_value + $5 \
             RETURNING last_value",
        )
        .bind(tenant)
        .bind(entity)
        .bind(scope_key)
        .bind(start as i64)
        .bind(step as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        let value: i64 = row.try_get("last_value").map_err(db_err)?;
        Ok(value as u64)
    }

    async fn claim_due_job(&self, now: DateTime<Utc>) -> Result<Option<Record>, AppError> {
        let row = sqlx::query(
            "UPDATE jobs SET data = jsonb_set(data, '{status}', '\"running\"'), \
                 updated_at = now() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE data ->> 'status' = 'pending' \
                   AND (data ->> 'scheduled_at')::timestamptz <= $1 \
                 ORDER BY (data ->> 'scheduled_at')::timestamptz \
                 FOR UPDATE SKIP LOCKED \
                 LIMIT 1 \
             ) \
             RETURNING id, tenant_id, removed_at, data, created_at, updated_at",
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(record_from_row).transpose()
    }
}
