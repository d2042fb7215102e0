//! Error taxonomy shared by every store operation.

use crate::addr::Addr;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Operation parameters are invalid (wrong category bits, empty input).
    #[error("Invalid parameters")]
    InvalidParams,

    /// Address does not resolve to a live element.
    #[error("Address is not valid: {addr}")]
    AddrNotValid {
        /// The failing address
        addr: Addr,
    },

    /// Element exists but is not a connector.
    #[error("Element is not a connector: {addr}")]
    NotConnector {
        /// The failing address
        addr: Addr,
    },

    /// Element exists but is not a link.
    #[error("Element is not a link: {addr}")]
    NotLink {
        /// The failing address
        addr: Addr,
    },

    /// Type bits are invalid for the requested operation.
    #[error("Invalid element type")]
    InvalidType,

    /// Every segment is allocated and no released slot remains.
    #[error("Store is full: max segments count is {max_segments}, extend or swap the store")]
    FullMemory {
        /// The configured segment ceiling
        max_segments: u32,
    },

    /// IO error from the file-memory collaborator.
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = StoreError::AddrNotValid {
            addr: Addr::new(3, 17),
        };
        assert_eq!(err.to_string(), "Address is not valid: (3, 17)");

        let err = StoreError::FullMemory { max_segments: 4 };
        assert!(err.to_string().contains("max segments count is 4"));
    }

    #[test]
    fn io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
