//! HTTP error response conversion
//!
//! This module provides HTTP-specific error response conversion for AppError.
//!
//! **Preferred handler pattern:** Return `Result<impl IntoResponse, HttpAppError>`.
//! Use `AppError` for errors and `?` so they become `HttpAppError` and render
//! consistently (status, body, logging).

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tessera_core::{context, AppError, ErrorMetadata, LogLevel};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Correlates with the X-Request-Id header and server logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from tessera-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Serialization failures in handlers (`serde_json::to_value(&model)?`)
/// route through the core conversion and render as 500.
impl From<serde_json::Error> for HttpAppError {
    fn from(err: serde_json::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// Convert JSON body deserialization failures into a 422 with our
/// ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that returns our ErrorResponse format on
/// deserialization failure instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let kind = error.kind();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_kind = kind, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_kind = kind, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_kind = kind, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let request_id = context::get_or_none().map(|ctx| ctx.request_id);

        // Hide internal detail in production and for invariant breakage.
        let details = if is_production_env() || app_error.is_invariant_breakage() {
            None
        } else {
            Some(app_error.to_string())
        };

        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            request_id,
            details,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_has_error_code_and_recoverable() {
        let response = ErrorResponse {
            error: "Not found: customers 1".to_string(),
            code: "NOT_FOUND".to_string(),
            recoverable: false,
            request_id: Some("req-1".to_string()),
            details: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["recoverable"], false);
        assert_eq!(json["request_id"], "req-1");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn serde_json_failures_convert_through_app_error() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let http = HttpAppError::from(err);
        assert_eq!(http.0.http_status_code(), 500);
        assert_eq!(http.0.error_code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn context_violation_renders_as_500_with_hidden_detail() {
        let err = HttpAppError(AppError::ContextViolation("tenant swap".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
