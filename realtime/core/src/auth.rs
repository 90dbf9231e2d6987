//! Bearer Token Supply
//!
//! The platform's auth layer issues and refreshes bearer tokens out-of-band;
//! this crate only consumes them. [`TokenSource`] is the seam: transports ask
//! for the current token just-in-time and tolerate staleness.
//!
//! # Failure Policy
//!
//! `refresh` is best-effort. Callers swallow refresh failures (logged at
//! `debug`) and proceed with whatever token is available, including none.

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

/// Errors from token refresh attempts
#[derive(Debug, Error)]
pub enum AuthError {
    /// The refresh call itself failed
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
}

/// Supplies the current bearer token for outgoing requests
///
/// Implementations are process-wide collaborators shared behind `Arc`.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// The current bearer token, if one is available
    async fn token(&self) -> Option<String>;

    /// Best-effort token refresh
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshFailed`] when the refresh could not be
    /// performed; callers treat this as non-fatal.
    async fn refresh(&self) -> Result<(), AuthError>;
}

/// A fixed token source for tests and embedded use
///
/// `refresh` is a no-op; the token can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticTokenSource {
    token: RwLock<Option<String>>,
}

impl StaticTokenSource {
    /// Create a source holding the given token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Create a source with no token
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the stored token
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_source() {
        let source = StaticTokenSource::new("abc123");
        assert_eq!(source.token().await.as_deref(), Some("abc123"));
        assert!(source.refresh().await.is_ok());

        source.set_token(None);
        assert!(source.token().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_source_has_no_token() {
        let source = StaticTokenSource::empty();
        assert!(source.token().await.is_none());
    }
}
