//! Unified error types for vidrec.
//!
//! Nothing here is fatal to the host: every variant describes a degraded
//! capability (durability, offline support, background sync) rather than a
//! broken recording workflow.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the vidrec worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Durable storage cannot be used at all; callers fall back to a volatile counter.
    #[error("STORAGE_UNAVAILABLE: {0}")]
    StorageUnavailable(String),

    /// A storage operation failed. The prior durable value is left intact.
    #[error("STORAGE_ERROR: {0}")]
    Storage(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A manifest asset could not be fetched; the generation was not installed.
    #[error("INSTALL_FAILED: {generation}: {url}: {reason}")]
    InstallFailed { generation: String, url: String, reason: String },

    /// The named cache generation does not exist.
    #[error("UNKNOWN_GENERATION: {0}")]
    UnknownGeneration(String),

    /// Background scheduling is not available in this runtime.
    #[error("SCHEDULING_UNSUPPORTED: {0}")]
    SchedulingUnsupported(String),

    /// No cached response for the request and the miss policy fails closed.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),
}

impl Error {
    /// Whether the error means durable storage should be abandoned for the session.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Storage(tokio_rusqlite::Error::Close(c)),
            _ => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Storage(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::StorageUnavailable(_) => -32001,
            Error::Storage(_) | Error::MigrationFailed(_) => -32002,
            Error::InstallFailed { .. } => -32003,
            Error::UnknownGeneration(_) => -32004,
            Error::SchedulingUnsupported(_) => -32005,
            Error::CacheMiss(_) => -32006,
            Error::InvalidUrl(_) => -32007,
            Error::FetchTimeout(_) => -32008,
            Error::FetchTooLarge(_) => -32009,
            Error::HttpError(_) => -32010,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InstallFailed {
            generation: "video-recorder-cache-v2".to_string(),
            url: "http://localhost/missing.js".to_string(),
            reason: "status 404".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("INSTALL_FAILED"));
        assert!(text.contains("video-recorder-cache-v2"));
        assert!(text.contains("status 404"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::SchedulingUnsupported("background sync disabled".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32005);
        assert!(mcp_err.message.contains("SCHEDULING_UNSUPPORTED"));
    }

    #[test]
    fn test_is_unavailable() {
        assert!(Error::StorageUnavailable("read-only".into()).is_unavailable());
        assert!(!Error::MigrationFailed("bad".into()).is_unavailable());
    }
}
