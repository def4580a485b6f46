//! Error types for the shopwatch state store.

use thiserror::Error;

use shopwatch_core::OperationType;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("shop not found: {0}")]
    ShopNotFound(String),

    #[error("country is immutable for registered shop {0}")]
    CountryImmutable(String),

    #[error("invalid {operation} transition for {domain}: {reason}")]
    InvalidTransition {
        domain: String,
        operation: OperationType,
        reason: String,
    },
}
