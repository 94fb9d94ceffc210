//! Error types for the proxy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::params::ParamError;

/// Failure to obtain a payload from the upstream site.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be completed (connect, timeout, body read).
    #[error("transport error requesting {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status} for {url}")]
    UpstreamStatus { url: String, status: u16 },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => None,
            Self::UpstreamStatus { status, .. } => Some(*status),
        }
    }
}

/// Failure to establish an elite session.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("elite credentials are not configured")]
    MissingCredentials,

    #[error("login request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("login returned status {0}")]
    Status(u16),

    #[error("login landed on '{landed}', expected '{expected}'")]
    WrongHost { landed: String, expected: String },
}

/// Expected structure absent from an upstream payload.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("element not found: {0}")]
    MissingElement(&'static str),

    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: &'static str, reason: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the request-serving path.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Query rejected against the current vocabulary (client error, structured payload).
    #[error(transparent)]
    Validation(#[from] ParamError),

    /// Malformed request that is not a vocabulary mismatch (client error, plain text).
    #[error("{0}")]
    BadRequest(String),

    /// Feature unavailable in the current mode.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Fetch(_) | Self::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        match self {
            Self::Validation(e) => (status, axum::Json(e.payload())).into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let validation = ProxyError::Validation(ParamError::InvalidOrder {
            value: "bogus".into(),
        });
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);

        let bad = ProxyError::BadRequest("nope".into());
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);

        let parse = ProxyError::Parse(ParseError::MissingElement("#screener-table"));
        assert_eq!(parse.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let fetch = ProxyError::Fetch(FetchError::UpstreamStatus {
            url: "https://finviz.com/screener.ashx".into(),
            status: 503,
        });
        assert_eq!(fetch.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_status_message() {
        let err = FetchError::UpstreamStatus {
            url: "https://finviz.com/export.ashx".into(),
            status: 401,
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(
            err.to_string(),
            "upstream returned status 401 for https://finviz.com/export.ashx"
        );
    }
}
