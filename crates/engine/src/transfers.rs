//! Transfer primitives.
//!
//! A `Transfer` moves points from one account to another. It is created in
//! [`TransferStatus::Processing`] inside the transfer unit of work and moved to
//! a terminal status before the unit commits, so committed rows are always
//! terminal and immutable.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, LedgerEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Processing,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl TryFrom<&str> for TransferStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::InvalidTransfer(format!(
                "invalid transfer status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub idempotency_key: String,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub amount: i64,
    pub status: TransferStatus,
    pub note: Option<String>,
    pub fail_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transfer {
    /// Whether this transfer was created from the same request parameters.
    pub(crate) fn matches_request(&self, from_user_id: i64, to_user_id: i64, amount: i64) -> bool {
        self.from_user_id == from_user_id && self.to_user_id == to_user_id && self.amount == amount
    }
}

/// A transfer together with the ledger rows it produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer: Transfer,
    pub ledger_entries: Vec<LedgerEntry>,
}

/// Result of a transfer submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// This call executed the transfer.
    Created(TransferReceipt),
    /// A transfer with the same idempotency key was already committed; nothing
    /// was mutated by this call.
    AlreadyCompleted(TransferReceipt),
}

impl TransferOutcome {
    #[must_use]
    pub fn receipt(&self) -> &TransferReceipt {
        match self {
            Self::Created(receipt) | Self::AlreadyCompleted(receipt) => receipt,
        }
    }

    #[must_use]
    pub fn into_receipt(self) -> TransferReceipt {
        match self {
            Self::Created(receipt) | Self::AlreadyCompleted(receipt) => receipt,
        }
    }

    #[must_use]
    pub fn is_replay(&self) -> bool {
        matches!(self, Self::AlreadyCompleted(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub idempotency_key: String,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub amount: i64,
    pub status: String,
    pub note: Option<String>,
    pub fail_reason: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::FromUserId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    FromUser,
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::ToUserId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    ToUser,
    #[sea_orm(has_many = "super::ledger::Entity")]
    Ledger,
}

impl Related<super::ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ledger.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            idempotency_key: model.idempotency_key,
            from_user_id: model.from_user_id,
            to_user_id: model.to_user_id,
            amount: model.amount,
            status: TransferStatus::try_from(model.status.as_str())?,
            note: model.note,
            fail_reason: model.fail_reason,
            created_at: model.created_at,
            updated_at: model.updated_at,
            completed_at: model.completed_at,
        })
    }
}
