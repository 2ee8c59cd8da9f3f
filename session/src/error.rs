use ajnabi_ledger::LedgerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No account found")]
    NoAccount,

    #[error("Insufficient coins: have {balance}, need {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Message recorded in the session snapshot
    ///
    /// Local refusals are named; everything else collapses to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            SessionError::NoAccount => "No account found".to_string(),
            SessionError::InsufficientFunds { .. } => "Insufficient coins".to_string(),
            SessionError::InvalidInput(msg) => msg.clone(),
            _ => fallback.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::NoAccount => StatusCode::NOT_FOUND,
            SessionError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            SessionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SessionError::Ledger(LedgerError::NotFound { .. }) => StatusCode::NOT_FOUND,
            SessionError::Ledger(LedgerError::InsufficientFunds { .. }) => StatusCode::BAD_REQUEST,
            SessionError::Ledger(LedgerError::InvalidAmount(_)) => StatusCode::BAD_REQUEST,
            SessionError::Ledger(e) if e.is_remote() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
