//! Error types module
//!
//! All errors are unified under the `AppError` enum. Domain code (gate,
//! tokens, evaluator, allocator) raises these kinds; the HTTP layer maps them
//! to status codes via the `ErrorMetadata` trait.
//!
//! `ContextMissing` and `ContextViolation` are programmer errors: handlers
//! must never catch them to "work anyway".

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limits
    Warn,
    /// Error level - for unexpected failures and broken invariants
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "TENANT_MISMATCH")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Tenant context missing")]
    ContextMissing,

    #[error("Tenant context violation: {0}")]
    ContextViolation(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Tenant is not active")]
    TenantSuspended,

    #[error("Tenant selector required for this endpoint")]
    TenantRequired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unique conflict: {0}")]
    UniqueConflict(String),

    #[error("Tenant mismatch between supplied value and current context")]
    TenantMismatch,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Sequence allocator contention: {0}")]
    AllocatorContention(String),

    #[error("Downstream unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

/// Static metadata per variant: (http_status, error_code, recoverable, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        // Broken invariants surface as 500 and are logged loudly.
        AppError::ContextMissing => (500, "CONTEXT_MISSING", false, LogLevel::Error),
        AppError::ContextViolation(_) => (500, "CONTEXT_VIOLATION", false, LogLevel::Error),
        AppError::AuthRequired(_) => (401, "AUTH_REQUIRED", false, LogLevel::Debug),
        AppError::TokenInvalid(_) => (401, "TOKEN_INVALID", false, LogLevel::Debug),
        AppError::TokenExpired => (401, "TOKEN_EXPIRED", false, LogLevel::Debug),
        AppError::NotAuthorized(_) => (403, "NOT_AUTHORIZED", false, LogLevel::Debug),
        AppError::TenantSuspended => (403, "TENANT_SUSPENDED", false, LogLevel::Debug),
        AppError::TenantRequired => (400, "TENANT_REQUIRED", false, LogLevel::Debug),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, LogLevel::Debug),
        AppError::UniqueConflict(_) => (409, "UNIQUE_CONFLICT", false, LogLevel::Debug),
        AppError::TenantMismatch => (409, "TENANT_MISMATCH", false, LogLevel::Warn),
        AppError::Validation(_) => (422, "VALIDATION", false, LogLevel::Debug),
        AppError::RateLimited => (429, "RATE_LIMITED", true, LogLevel::Warn),
        AppError::AllocatorContention(_) => (429, "ALLOCATOR_CONTENTION", true, LogLevel::Warn),
        AppError::Unavailable(_) => (503, "UNAVAILABLE", true, LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl AppError {
    /// Error kind name used in audit records and detailed responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ContextMissing => "ContextMissing",
            AppError::ContextViolation(_) => "ContextViolation",
            AppError::AuthRequired(_) => "AuthRequired",
            AppError::TokenInvalid(_) => "TokenInvalid",
            AppError::TokenExpired => "TokenExpired",
            AppError::NotAuthorized(_) => "NotAuthorized",
            AppError::TenantSuspended => "TenantSuspended",
            AppError::TenantRequired => "TenantRequired",
            AppError::NotFound(_) => "NotFound",
            AppError::UniqueConflict(_) => "UniqueConflict",
            AppError::TenantMismatch => "TenantMismatch",
            AppError::Validation(_) => "Validation",
            AppError::RateLimited => "RateLimited",
            AppError::AllocatorContention(_) => "AllocatorContention",
            AppError::Unavailable(_) => "Unavailable",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// True for the two invariant-breakage kinds that handlers must not catch.
    pub fn is_invariant_breakage(&self) -> bool {
        matches!(
            self,
            AppError::ContextMissing | AppError::ContextViolation(_)
        )
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            // Internal details, credentials, and tenant ids never reach clients.
            AppError::ContextMissing | AppError::ContextViolation(_) => {
                "Internal server error".to_string()
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::Unavailable(_) => "Service temporarily unavailable".to_string(),
            AppError::TenantMismatch => {
                "Supplied tenant does not match the current context".to_string()
            }
            other => other.to_string(),
        }
    }
}
