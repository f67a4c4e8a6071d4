//! Errors - エラー型と分類
//!
//! - `ValidationError`: 呼び出し側の入力エラー（store には触れない）
//! - `LedgerError`: store の障害（接続・制約違反・トランザクション中断）
//! - `ApiError`: 呼び出し側に返すエラー（InvalidArgument / Internal）
//!
//! "not found" はエラーではなく `Option::None` で表現する。

use std::fmt;

use thiserror::Error;

/// Rejected request shape. Raised before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty recipient ID")]
    EmptyRecipientId,

    #[error("empty pagination token")]
    EmptyPaginationToken,

    #[error("invalid pagination token: {0}")]
    InvalidPaginationToken(String),
}

/// Failure inside the decision ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("transaction aborted: {0}")]
    Transaction(String),

    #[error("migration failed: {0}")]
    Migration(String),

    /// The blocking task running the statement panicked or was cancelled.
    #[error("ledger task failed: {0}")]
    Join(String),

    #[error("ledger lock poisoned")]
    Poisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for LedgerError {
    fn from(e: tokio::task::JoinError) -> Self {
        LedgerError::Join(e.to_string())
    }
}

/// Caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    InvalidArgument,
    Internal,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::InvalidArgument => f.write_str("InvalidArgument"),
            StatusCode::Internal => f.write_str("Internal"),
        }
    }
}

/// Error returned by the orchestrator to the transport layer.
///
/// The store's message is folded into `message`; callers only ever see the
/// two categories in `code`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("code = {code} desc = {message}")]
pub struct ApiError {
    pub code: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::InvalidArgument,
            message: message.into(),
        }
    }

    /// Wrap a ledger failure with the operation context, e.g.
    /// `failed to get recipient likes, storage error: ...`.
    pub fn internal(context: &str, source: &LedgerError) -> Self {
        Self {
            code: StatusCode::Internal,
            message: format!("{context}, {source}"),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::invalid_argument(e.to_string())
    }
}
