//! HTTP error mapping
//!
//! Every handler returns `Result<T, GatewayError>`; the conversion to a
//! status code follows the shared taxonomy: 429 rate-limited, 401
//! unauthenticated, 400 bad request, 502 upstream after fallback failed,
//! 500 everything else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use hearth_core::Error;

#[derive(Debug)]
pub struct GatewayError(pub Error);

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Unauthenticated => (StatusCode::UNAUTHORIZED, "Invalid API key".to_string()),
            Error::CircuitOpen | Error::Upstream(_) => {
                (StatusCode::BAD_GATEWAY, self.0.to_string())
            }
            Error::ProviderNotConfigured(provider) => (
                StatusCode::BAD_GATEWAY,
                format!("Provider not configured: {provider}"),
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::warn!(error = %self.0, "request rejected");
        }

        (
            status,
            Json(json!({
                "error": {
                    "message": message,
                    "type": error_type(&self.0),
                }
            })),
        )
            .into_response()
    }
}

fn error_type(error: &Error) -> &'static str {
    match error {
        Error::RateLimited => "rate_limited",
        Error::Unauthenticated => "unauthenticated",
        Error::CircuitOpen => "circuit_open",
        Error::Upstream(_) => "upstream_error",
        Error::BadRequest(_) => "bad_request",
        Error::ProviderNotConfigured(_) => "provider_not_configured",
        Error::ParseFailure(_) => "parse_failure",
        Error::Timeout(_) => "timeout",
        _ => "server_error",
    }
}

impl From<Error> for GatewayError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let resp = GatewayError(Error::RateLimited).into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let resp = GatewayError(Error::BadRequest("bad".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = GatewayError(Error::Upstream("boom".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = GatewayError(Error::Internal("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
