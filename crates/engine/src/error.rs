//! The module contains the errors the engine can throw.
//!
//! Every error belongs to an [`ErrorClass`], which is what callers (the HTTP
//! layer, the admin CLI) use to pick a transport-level status:
//!
//! - [`InvalidAmount`], [`InvalidTransfer`], [`InvalidInput`]: validation,
//!   rejected before any storage access.
//! - [`KeyNotFound`]: an account or transfer does not exist.
//! - [`InsufficientPoints`], [`ExistingKey`], [`IdempotencyMismatch`],
//!   [`TransferInProgress`], [`AccountInUse`], [`StaleBalance`],
//!   [`BalanceOverflow`]: conflicts. They can surface midway through a unit,
//!   which is then rolled back.
//! - [`Database`]: storage failure, safe to retry with the same idempotency
//!   key.
//!
//! [`DuplicateKey`] is raised inside a transfer unit when the idempotency key
//! unique index rejects the insert. The engine resolves it into the already
//! committed transfer, so callers of `execute_transfer` never observe it.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidTransfer`]: EngineError::InvalidTransfer
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`InsufficientPoints`]: EngineError::InsufficientPoints
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`IdempotencyMismatch`]: EngineError::IdempotencyMismatch
//!  [`TransferInProgress`]: EngineError::TransferInProgress
//!  [`AccountInUse`]: EngineError::AccountInUse
//!  [`StaleBalance`]: EngineError::StaleBalance
//!  [`BalanceOverflow`]: EngineError::BalanceOverflow
//!  [`Database`]: EngineError::Database
//!  [`DuplicateKey`]: EngineError::DuplicateKey
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Insufficient points: {0}")]
    InsufficientPoints(String),
    #[error("Duplicate idempotency key: {0}")]
    DuplicateKey(String),
    #[error("Idempotency key reused with a different request: {0}")]
    IdempotencyMismatch(String),
    #[error("Transfer still in progress: {0}")]
    TransferInProgress(String),
    #[error("Account in use: {0}")]
    AccountInUse(String),
    #[error("Balance changed concurrently: {0}")]
    StaleBalance(String),
    #[error("Balance would overflow: {0}")]
    BalanceOverflow(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Coarse failure classes exposed to the caller boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl EngineError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidAmount(_) | Self::InvalidTransfer(_) | Self::InvalidInput(_) => {
                ErrorClass::Validation
            }
            Self::KeyNotFound(_) => ErrorClass::NotFound,
            Self::ExistingKey(_)
            | Self::InsufficientPoints(_)
            | Self::DuplicateKey(_)
            | Self::IdempotencyMismatch(_)
            | Self::TransferInProgress(_)
            | Self::AccountInUse(_)
            | Self::StaleBalance(_)
            | Self::BalanceOverflow(_) => ErrorClass::Conflict,
            Self::Database(_) => ErrorClass::Internal,
        }
    }
}

/// True when the storage engine rejected a write because of a unique index.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidTransfer(a), Self::InvalidTransfer(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InsufficientPoints(a), Self::InsufficientPoints(b)) => a == b,
            (Self::DuplicateKey(a), Self::DuplicateKey(b)) => a == b,
            (Self::IdempotencyMismatch(a), Self::IdempotencyMismatch(b)) => a == b,
            (Self::TransferInProgress(a), Self::TransferInProgress(b)) => a == b,
            (Self::AccountInUse(a), Self::AccountInUse(b)) => a == b,
            (Self::StaleBalance(a), Self::StaleBalance(b)) => a == b,
            (Self::BalanceOverflow(a), Self::BalanceOverflow(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
