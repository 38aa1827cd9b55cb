//! Error types for webtap
//!
//! This module provides the error type hierarchy using `thiserror`.
//! Only launch and page-creation failures are unconditionally fatal;
//! navigation and wait failures are downgraded to a degraded session
//! outcome when the caller opts into `force_network`.

use thiserror::Error;

/// The main error type for webtap operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser lifecycle errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Navigation session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Browser lifecycle and control errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// No browser instance is running
    #[error("Browser not launched")]
    NotLaunched,

    /// Failed to shut the browser down cleanly
    #[error("Failed to close browser: {0}")]
    CloseFailed(String),
}

/// Errors raised while driving one navigation session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Failed to create a new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Navigation failed (DNS, TLS, connection reset, engine error)
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// The wait condition did not fire within the budget
    #[error("Wait condition timed out after {0}ms")]
    WaitTimeout(u64),
}

/// Result type alias for webtap operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Whether this error may be downgraded to a degraded outcome
    /// under `force_network`. Invalid URLs and page creation failures
    /// happen before any ledger exists and stay fatal.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::Browser(_)
                | Error::Session(SessionError::PageCreationFailed(_))
                | Error::Session(SessionError::InvalidUrl(_))
        )
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Browser(BrowserError::LaunchFailed("no chrome".to_string()));
        assert!(err.to_string().contains("Failed to launch browser"));
        assert!(err.to_string().contains("no chrome"));
    }

    #[test]
    fn test_session_error() {
        let err = SessionError::WaitTimeout(50);
        assert_eq!(err.to_string(), "Wait condition timed out after 50ms");
    }

    #[test]
    fn test_page_creation_not_recoverable() {
        let err = Error::Session(SessionError::PageCreationFailed("target crashed".into()));
        assert!(!err.is_recoverable());
        let err = Error::Session(SessionError::InvalidUrl("example.com".into()));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_navigation_recoverable() {
        let err = Error::Session(SessionError::NavigationFailed("net::ERR_FAILED".into()));
        assert!(err.is_recoverable());
        let err = Error::Session(SessionError::WaitTimeout(100));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_generic_error() {
        let err = Error::generic("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }
}
