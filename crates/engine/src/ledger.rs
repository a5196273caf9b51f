//! Point ledger.
//!
//! A [`LedgerEntry`] records a single balance change of one account. The
//! ledger is append-only: the engine exposes no update or delete operation,
//! and every change to a balance has a matching entry, so an account history
//! can be rebuilt from its entries alone.
//!
//! `change` is signed:
//! - positive values increase the account balance
//! - negative values decrease the account balance

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventType {
    TransferOut,
    TransferIn,
    /// Initial balance granted at registration.
    OpeningBalance,
}

impl LedgerEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
            Self::OpeningBalance => "opening_balance",
        }
    }
}

impl TryFrom<&str> for LedgerEventType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "transfer_out" => Ok(Self::TransferOut),
            "transfer_in" => Ok(Self::TransferIn),
            "opening_balance" => Ok(Self::OpeningBalance),
            other => Err(EngineError::InvalidTransfer(format!(
                "invalid ledger event type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub change: i64,
    pub balance_after: i64,
    pub event_type: LedgerEventType,
    pub transfer_id: Option<i64>,
    pub reference: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An entry about to be appended. The id is assigned by storage.
#[derive(Clone, Debug)]
pub(crate) struct NewLedgerEntry {
    pub user_id: i64,
    pub change: i64,
    pub balance_after: i64,
    pub event_type: LedgerEventType,
    pub transfer_id: Option<i64>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "point_ledger")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub change: i64,
    pub balance_after: i64,
    pub event_type: String,
    pub transfer_id: Option<i64>,
    pub reference: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::UserId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::transfers::Entity",
        from = "Column::TransferId",
        to = "super::transfers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Transfers,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::transfers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transfers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&NewLedgerEntry> for ActiveModel {
    fn from(entry: &NewLedgerEntry) -> Self {
        Self {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(entry.user_id),
            change: ActiveValue::Set(entry.change),
            balance_after: ActiveValue::Set(entry.balance_after),
            event_type: ActiveValue::Set(entry.event_type.as_str().to_string()),
            transfer_id: ActiveValue::Set(entry.transfer_id),
            reference: ActiveValue::Set(entry.reference.clone()),
            metadata: ActiveValue::Set(None),
            created_at: ActiveValue::Set(entry.created_at),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            change: model.change,
            balance_after: model.balance_after,
            event_type: LedgerEventType::try_from(model.event_type.as_str())?,
            transfer_id: model.transfer_id,
            reference: model.reference,
            metadata: model.metadata,
            created_at: model.created_at,
        })
    }
}
