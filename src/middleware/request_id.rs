use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use tracing::Span;
use uuid::Uuid;

/// HTTP header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID stored in the request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Creates a new random request ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts a caller-supplied ID when it is short, non-empty visible ASCII
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let value = value.to_str().ok()?.trim();
        let valid = !value.is_empty()
            && value.len() <= MAX_REQUEST_ID_LEN
            && value.chars().all(|c| c.is_ascii_graphic());
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Propagates the caller's `x-request-id` or generates one, stores it in the
/// request extensions and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(RequestId::from_header)
        .unwrap_or_else(RequestId::generate);

    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Tracing span carrying the request ID
pub fn make_span_with_request_id(request: &Request<Body>) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(RequestId::as_str)
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// Logs status and latency inside the request span
pub fn log_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    tracing::info!(
        status = response.status().as_u16(),
        latency_ms = latency.as_millis() as u64,
        "Request completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_propagated_when_sane() {
        let id = RequestId::from_header(&HeaderValue::from_static("abc-123")).unwrap();
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_bad_header_is_rejected() {
        assert!(RequestId::from_header(&HeaderValue::from_static("   ")).is_none());
        assert!(RequestId::from_header(&HeaderValue::from_static("has space")).is_none());
        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        assert!(RequestId::from_header(&HeaderValue::from_str(&long).unwrap()).is_none());
    }

    #[test]
    fn test_generated_ids_are_uuids() {
        let id = RequestId::generate();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }
}
