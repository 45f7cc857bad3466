//! Quota provider trait, token source and error types
//!
//! Defines the seams between the refresh engine and its collaborators:
//! the thing that performs a limit check and the thing that supplies the
//! bearer token.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use super::types::QuotaSnapshot;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when checking rate limits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    /// No bearer token is available
    #[error("{0}")]
    Unauthorized(String),

    /// The endpoint answered with a non-success status other than 429
    #[error("{status} - {status_text}")]
    RemoteError { status: u16, status_text: String },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Transport(String),

    /// A rate-limit header was missing or could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl QuotaError {
    /// The error raised when no token is present
    pub fn unauthorized() -> Self {
        QuotaError::Unauthorized("Not authorised".to_string())
    }

    /// Create a remote error from a status code and reason
    pub fn remote(status: u16, status_text: impl Into<String>) -> Self {
        QuotaError::RemoteError {
            status,
            status_text: status_text.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        QuotaError::MalformedResponse(msg.into())
    }

    /// Coarse classification handed to error observers
    pub fn kind(&self) -> QuotaErrorKind {
        match self {
            QuotaError::Unauthorized(_) => QuotaErrorKind::Unauthorized,
            QuotaError::RemoteError { .. } => QuotaErrorKind::RemoteError,
            QuotaError::Transport(_) => QuotaErrorKind::TransportError,
            QuotaError::MalformedResponse(_) => QuotaErrorKind::MalformedResponse,
        }
    }
}

impl From<reqwest::Error> for QuotaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QuotaError::Transport("Request timed out".to_string())
        } else if err.is_connect() {
            QuotaError::Transport("Connection failed".to_string())
        } else {
            QuotaError::Transport(err.to_string())
        }
    }
}

/// Kind of a [`QuotaError`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaErrorKind {
    Unauthorized,
    RemoteError,
    TransportError,
    MalformedResponse,
}

impl std::fmt::Display for QuotaErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaErrorKind::Unauthorized => write!(f, "unauthorized"),
            QuotaErrorKind::RemoteError => write!(f, "remote_error"),
            QuotaErrorKind::TransportError => write!(f, "transport_error"),
            QuotaErrorKind::MalformedResponse => write!(f, "malformed_response"),
        }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Something that can perform a single rate-limit check
///
/// Implementations are responsible for updating the shared cache on every
/// call, success or failure. The scheduler and the check-limits action only
/// ever talk to this trait, which lets tests substitute a fake.
#[async_trait]
pub trait QuotaProvider: Send + Sync {
    /// Unique identifier for this provider, used in log lines
    fn provider_id(&self) -> &'static str;

    /// Perform one check with the given bearer token
    ///
    /// # Errors
    ///
    /// - `Unauthorized` when `token` is `None` or empty
    /// - `RemoteError` for non-success statuses other than 429
    /// - `Transport` when the request fails
    /// - `MalformedResponse` when the limit headers are unusable
    async fn fetch_limits(&self, token: Option<&str>) -> Result<QuotaSnapshot, QuotaError>;
}

// ============================================================================
// Token Source
// ============================================================================

/// Supplies the current bearer token; never mutated by the engine
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// A token fixed at construction time
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A token the host can swap when the signed-in identity changes
#[derive(Debug, Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token.filter(|t| !t.is_empty()))),
        }
    }

    /// Replace the current token
    pub fn set(&self, token: Option<String>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = token.filter(|t| !t.is_empty());
    }
}

impl TokenSource for SharedToken {
    fn token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_error_display() {
        assert_eq!(QuotaError::unauthorized().to_string(), "Not authorised");
        assert_eq!(
            QuotaError::remote(503, "Service Unavailable").to_string(),
            "503 - Service Unavailable"
        );
        assert_eq!(
            QuotaError::malformed("missing header X-RL-Daily-Limit").to_string(),
            "Malformed response: missing header X-RL-Daily-Limit"
        );
    }

    #[test]
    fn test_quota_error_kind() {
        assert_eq!(QuotaError::unauthorized().kind(), QuotaErrorKind::Unauthorized);
        assert_eq!(QuotaError::remote(500, "x").kind(), QuotaErrorKind::RemoteError);
        assert_eq!(
            QuotaError::Transport("reset".to_string()).kind(),
            QuotaErrorKind::TransportError
        );
        assert_eq!(QuotaErrorKind::MalformedResponse.to_string(), "malformed_response");
    }

    #[test]
    fn test_static_token_filters_empty() {
        assert_eq!(StaticToken::new(Some(String::new())).token(), None);
        assert_eq!(
            StaticToken::new(Some("abc".to_string())).token(),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_shared_token_swap() {
        let token = SharedToken::new(None);
        let reader = token.clone();
        assert_eq!(reader.token(), None);

        token.set(Some("next-identity".to_string()));
        assert_eq!(reader.token(), Some("next-identity".to_string()));

        token.set(Some(String::new()));
        assert_eq!(reader.token(), None);
    }
}
