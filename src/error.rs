//! Per-request failure taxonomy.
//!
//! Every variant is handled inside the request pipeline and turned into a
//! response; none of them is fatal to the process.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Challenge sent with every 401.
pub const WWW_AUTHENTICATE_CHALLENGE: &str = r#"Basic realm="restricted", charset="UTF-8""#;

/// Errors produced while admitting, authenticating or forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No admission slot became free within the queue timeout.
    #[error("no admission slot available after {waited:?}")]
    CapacityExceeded { waited: Duration },

    /// Missing or wrong credential.
    #[error("missing or invalid credentials")]
    Unauthenticated,

    /// Connecting to or talking with the upstream failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The upstream did not send response headers in time.
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// The rewritten request could not be assembled.
    #[error("failed to build upstream request: {0}")]
    InvalidRequest(#[from] axum::http::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::CapacityExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ProxyError::Upstream(_)
            | ProxyError::UpstreamTimeout(_)
            | ProxyError::InvalidRequest(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::CapacityExceeded { .. } => "capacity_exceeded",
            ProxyError::Unauthenticated => "unauthenticated",
            ProxyError::Upstream(_) | ProxyError::InvalidRequest(_) => "upstream_error",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // 401 carries no body unless the pipeline adds one.
            ProxyError::Unauthenticated => (
                status,
                [(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(WWW_AUTHENTICATE_CHALLENGE),
                )],
            )
                .into_response(),
            _ => (status, status.canonical_reason().unwrap_or_default()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        let capacity = ProxyError::CapacityExceeded {
            waited: Duration::from_millis(50),
        };
        assert_eq!(capacity.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ProxyError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ProxyError::UpstreamTimeout(Duration::from_secs(1)).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn unauthenticated_response_has_challenge() {
        let response = ProxyError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            WWW_AUTHENTICATE_CHALLENGE
        );
    }

    #[test]
    fn capacity_response_is_429() {
        let response = ProxyError::CapacityExceeded {
            waited: Duration::ZERO,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
