//! Mapping of ledger errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use petchain_chain::LedgerError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Ledger(err) => match err {
                LedgerError::InvalidTransaction(_)
                | LedgerError::InvalidBlock(_)
                | LedgerError::InvalidNodeAddress(_)
                | LedgerError::NothingToMine => StatusCode::BAD_REQUEST,
                LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::DuplicateTransaction
                | LedgerError::StaleTip
                | LedgerError::MiningCancelled => StatusCode::CONFLICT,
                LedgerError::Storage(_) | LedgerError::LockPoisoned | LedgerError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
