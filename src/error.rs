//! Error types for ledger and record store operations
//!
//! Covers the three failure families a client of the hosted record store
//! runs into: remote-call failures, validation failures and missing records.

use thiserror::Error;

/// Core error type for ledger, account and catalog operations
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    /// Record store unreachable or the request did not complete
    #[error("Failed to reach record store: {0}")]
    Connection(String),

    /// No record matched the lookup
    #[error("Record not found in {table}: {key}")]
    NotFound { table: String, key: String },

    /// Debit would take the balance below zero
    #[error("Insufficient coins: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    /// Zero or out-of-range coin amount
    #[error("Invalid coin amount: {0}")]
    InvalidAmount(u64),

    /// Record rejected before it reached the store
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Conditional write lost to a concurrent writer too many times,
    /// or a write collided with an existing record
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Store answered with something we could not interpret
    #[error("Invalid response from record store: {0}")]
    InvalidResponse(String),

    /// Record could not be converted to or from its stored form
    #[error("Serialization error: {0}")]
    Serialization(String),
}

// Helper functions for common error scenarios
impl LedgerError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a not-found error for a table lookup
    pub fn not_found(table: impl Into<String>, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            table: table.into(),
            key: key.to_string(),
        }
    }

    /// True for failures caused by the remote store rather than by the request
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::InvalidResponse(_))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}
