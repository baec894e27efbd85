//! Unified error types for stash.
//!
//! Display strings carry a stable `CODE:` prefix so log lines and MCP error
//! payloads can be matched without parsing the message.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the caching engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fetch rejected, timed out, or returned a non-ok status.
    #[error("NETWORK_FAILURE: {0}")]
    NetworkFailure(String),

    /// Lookup found no entry for the key.
    ///
    /// Not raised by the engine itself: store lookups report misses as `None`
    /// and the strategies fall through to the network. Kept in the taxonomy so
    /// embedders that require an entry share the same code.
    #[error("PARTITION_MISS: {0}")]
    PartitionMiss(String),

    /// One or more manifest fetches failed during install.
    #[error("INSTALL_FAILURE: {0}")]
    InstallFailure(String),

    /// Malformed or unrecognized control message.
    #[error("PROTOCOL_ERROR: {0}")]
    ProtocolError(String),

    /// Lifecycle operation requested out of order (e.g. activate before install).
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::NetworkFailure(msg) => (-32000, msg.clone()),
            Error::PartitionMiss(msg) => (-32001, msg.clone()),
            Error::InstallFailure(msg) => (-32003, msg.clone()),
            Error::ProtocolError(msg) => (-32004, msg.clone()),
            Error::InvalidState(msg) => (-32005, msg.clone()),
            Error::InvalidUrl(msg) => (-32006, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PartitionMiss("GET https://example.com/".to_string());
        assert!(err.to_string().contains("PARTITION_MISS"));
        assert!(err.to_string().contains("https://example.com/"));
    }

    #[test]
    fn test_install_failure_display() {
        let err = Error::InstallFailure("/style.css: status 404".to_string());
        assert_eq!(err.to_string(), "INSTALL_FAILURE: /style.css: status 404");
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::NetworkFailure("offline".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32000);

        let mcp_err: McpError = Error::InvalidInput("empty url".into()).into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_rusqlite_error_maps_to_database() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(err.to_string().starts_with("CACHE_ERROR"));
    }
}
