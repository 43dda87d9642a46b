//! Configuration module
//!
//! This module provides configuration for the API and worker processes:
//! server, database/store, token signing, rate limiting, and job queue
//! settings. Everything is read from the environment via `Config::from_env`.

use std::env;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const REFRESH_TOKEN_TTL_HOURS: i64 = 24 * 14;
const HTTP_RATE_LIMIT_PER_MINUTE: u32 = 100;
const HTTP_TENANT_RATE_LIMIT_PER_MINUTE: u32 = 200;
const AUTH_FAILURE_LIMIT: u32 = 5;
const AUTH_FAILURE_WINDOW_SECS: u64 = 900;
const JOB_QUEUE_MAX_WORKERS: usize = 4;
const JOB_QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const JOB_QUEUE_MAX_RETRIES: i32 = 3;
const SEQUENCE_RETRY_ATTEMPTS: u32 = 8;

/// Which persistence layer backs the data access gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    /// In-process store, used by tests and local development.
    Memory,
    /// PostgreSQL via sqlx.
    Postgres,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,

    pub store_kind: StoreKind,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,

    // Every (actor kind, token use) pair signs with its own secret: a
    // compromised tenant-user key cannot mint platform tokens, and a refresh
    // token can never verify as an access token.
    pub tenant_access_secret: String,
    pub tenant_refresh_secret: String,
    pub platform_access_secret: String,
    pub platform_refresh_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_hours: i64,

    pub http_rate_limit_per_minute: u32,
    pub http_tenant_rate_limit_per_minute: Option<u32>,
    pub auth_failure_limit: u32,
    pub auth_failure_window_secs: u64,

    pub job_queue_max_workers: usize,
    pub job_queue_poll_interval_ms: u64,
    pub job_queue_max_retries: i32,

    /// Bounded retries for sequence allocation under write contention.
    pub sequence_retry_attempts: u32,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let store_kind = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => StoreKind::Memory,
            "postgres" => StoreKind::Postgres,
            other => {
                return Err(anyhow::anyhow!(
                    "STORE_BACKEND must be 'memory' or 'postgres', got '{}'",
                    other
                ))
            }
        };

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            store_kind,
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            tenant_access_secret: env::var("TENANT_ACCESS_SECRET")
                .map_err(|_| anyhow::anyhow!("TENANT_ACCESS_SECRET must be set"))?,
            tenant_refresh_secret: env::var("TENANT_REFRESH_SECRET")
                .map_err(|_| anyhow::anyhow!("TENANT_REFRESH_SECRET must be set"))?,
            platform_access_secret: env::var("PLATFORM_ACCESS_SECRET")
                .map_err(|_| anyhow::anyhow!("PLATFORM_ACCESS_SECRET must be set"))?,
            platform_refresh_secret: env::var("PLATFORM_REFRESH_SECRET")
                .map_err(|_| anyhow::anyhow!("PLATFORM_REFRESH_SECRET must be set"))?,
            access_token_ttl_minutes: env::var("ACCESS_TOKEN_TTL_MINUTES")
                .unwrap_or_else(|_| ACCESS_TOKEN_TTL_MINUTES.to_string())
                .parse()
                .unwrap_or(ACCESS_TOKEN_TTL_MINUTES),
            refresh_token_ttl_hours: env::var("REFRESH_TOKEN_TTL_HOURS")
                .unwrap_or_else(|_| REFRESH_TOKEN_TTL_HOURS.to_string())
                .parse()
                .unwrap_or(REFRESH_TOKEN_TTL_HOURS),
            http_rate_limit_per_minute: env::var("HTTP_RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| HTTP_RATE_LIMIT_PER_MINUTE.to_string())
                .parse()
                .unwrap_or(HTTP_RATE_LIMIT_PER_MINUTE),
            http_tenant_rate_limit_per_minute: env::var("HTTP_TENANT_RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(Some(HTTP_TENANT_RATE_LIMIT_PER_MINUTE)),
            auth_failure_limit: env::var("AUTH_FAILURE_LIMIT")
                .unwrap_or_else(|_| AUTH_FAILURE_LIMIT.to_string())
                .parse()
                .unwrap_or(AUTH_FAILURE_LIMIT),
            auth_failure_window_secs: env::var("AUTH_FAILURE_WINDOW_SECS")
                .unwrap_or_else(|_| AUTH_FAILURE_WINDOW_SECS.to_string())
                .parse()
                .unwrap_or(AUTH_FAILURE_WINDOW_SECS),
            job_queue_max_workers: env::var("JOB_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| JOB_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_MAX_WORKERS),
            job_queue_poll_interval_ms: env::var("JOB_QUEUE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| JOB_QUEUE_POLL_INTERVAL_MS.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_POLL_INTERVAL_MS),
            job_queue_max_retries: env::var("JOB_QUEUE_MAX_RETRIES")
                .unwrap_or_else(|_| JOB_QUEUE_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_MAX_RETRIES),
            sequence_retry_attempts: env::var("SEQUENCE_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| SEQUENCE_RETRY_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(SEQUENCE_RETRY_ATTEMPTS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let secrets = [
            ("TENANT_ACCESS_SECRET", &self.tenant_access_secret),
            ("TENANT_REFRESH_SECRET", &self.tenant_refresh_secret),
            ("PLATFORM_ACCESS_SECRET", &self.platform_access_secret),
            ("PLATFORM_REFRESH_SECRET", &self.platform_refresh_secret),
        ];
        for (name, value) in &secrets {
            if value.len() < 32 {
                return Err(anyhow::anyhow!(
                    "{} must be at least 32 characters long",
                    name
                ));
            }
        }
        for (i, (name_a, value_a)) in secrets.iter().enumerate() {
            for (name_b, value_b) in &secrets[i + 1..] {
                if value_a == value_b {
                    return Err(anyhow::anyhow!("{} and {} must differ", name_a, name_b));
                }
            }
        }

        if self.is_production() && self.cors_origins.iter().any(|o| o.trim() == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.store_kind == StoreKind::Postgres {
            match self.database_url.as_deref() {
                Some(url) if url.starts_with("postgresql://") || url.starts_with("postgres://") => {
                }
                Some(_) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when STORE_BACKEND=postgres"
                    ))
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_port: 4000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            environment: "development".to_string(),
            store_kind: StoreKind::Memory,
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            tenant_access_secret: "a".repeat(48),
            tenant_refresh_secret: "b".repeat(48),
            platform_access_secret: "c".repeat(48),
            platform_refresh_secret: "d".repeat(48),
            access_token_ttl_minutes: ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_hours: REFRESH_TOKEN_TTL_HOURS,
            http_rate_limit_per_minute: HTTP_RATE_LIMIT_PER_MINUTE,
            http_tenant_rate_limit_per_minute: Some(HTTP_TENANT_RATE_LIMIT_PER_MINUTE),
            auth_failure_limit: AUTH_FAILURE_LIMIT,
            auth_failure_window_secs: AUTH_FAILURE_WINDOW_SECS,
            job_queue_max_workers: JOB_QUEUE_MAX_WORKERS,
            job_queue_poll_interval_ms: JOB_QUEUE_POLL_INTERVAL_MS,
            job_queue_max_retries: JOB_QUEUE_MAX_RETRIES,
            sequence_retry_attempts: SEQUENCE_RETRY_ATTEMPTS,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn short_secrets_are_rejected() {
        let mut config = base_config();
        config.tenant_access_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn identical_secrets_are_rejected() {
        let mut config = base_config();
        config.platform_access_secret = config.tenant_access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn wildcard_cors_rejected_in_production() {
        let mut config = base_config();
        config.environment = "production".to_string();
        config.cors_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let mut config = base_config();
        config.store_kind = StoreKind::Postgres;
        assert!(config.validate().is_err());

        config.database_url = Some("postgresql://localhost/tessera".to_string());
        assert!(config.validate().is_ok());
    }
}
