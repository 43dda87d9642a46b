//! Request id middleware.
//!
//! Assigns every request an opaque id, stores it in request extensions for
//! the admission pipeline to weave into the tenant context, and echoes it
//! back in the `X-Request-Id` response header. Client-supplied ids are
//! honored when they look sane, so callers can correlate across hops.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn acceptable(raw: &str) -> bool {
    !raw.is_empty() && raw.len() <= 64 && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|raw| acceptable(raw))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sane_client_ids_are_accepted() {
        assert!(acceptable("req-123-abc"));
        assert!(acceptable(&Uuid::new_v4().to_string()));
        assert!(!acceptable(""));
        assert!(!acceptable("has spaces"));
        assert!(!acceptable(&"x".repeat(65)));
    }
}
