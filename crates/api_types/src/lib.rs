//! Wire types of the points ledger HTTP API.
//!
//! Stored records (members, transfers, ledger entries) are serialized with
//! `snake_case` fields; request bodies and list envelopes use `camelCase`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of a generic error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Query string of paginated list endpoints.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Paginated list envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
}

pub mod user {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct User {
        pub id: i64,
        pub member_code: String,
        pub membership_level: String,
        pub name: String,
        pub surname: String,
        pub phone: String,
        pub email: String,
        pub registration_date: String,
        pub remaining_points: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserNew {
        pub member_code: String,
        #[serde(default)]
        pub membership_level: String,
        #[serde(default)]
        pub name: String,
        #[serde(default)]
        pub surname: String,
        #[serde(default)]
        pub phone: String,
        #[serde(default)]
        pub email: String,
        /// `YYYY-MM-DD`; the server uses today when absent.
        pub registration_date: Option<String>,
        /// Opening balance, must be >= 0.
        #[serde(default)]
        pub remaining_points: i64,
    }

    /// Profile update. Absent fields are left untouched; the balance cannot
    /// be changed through this endpoint.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct UserUpdate {
        pub member_code: Option<String>,
        pub membership_level: Option<String>,
        pub name: Option<String>,
        pub surname: Option<String>,
        pub phone: Option<String>,
        pub email: Option<String>,
        pub registration_date: Option<String>,
    }
}

pub mod ledger {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EventType {
        TransferOut,
        TransferIn,
        OpeningBalance,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LedgerEntry {
        pub id: i64,
        pub user_id: i64,
        /// Signed point delta.
        pub change: i64,
        pub balance_after: i64,
        pub event_type: EventType,
        pub transfer_id: Option<i64>,
        pub reference: Option<String>,
        pub metadata: Option<String>,
        pub created_at: DateTime<Utc>,
    }
}

pub mod transfer {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransferStatus {
        Processing,
        Completed,
        Failed,
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

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransferNew {
        pub from_user_id: i64,
        pub to_user_id: i64,
        pub amount: i64,
        pub note: Option<String>,
        /// Optional idempotency key for safely retrying the same request.
        /// The `Idempotency-Key` header takes precedence when both are sent.
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransferResponse {
        pub transfer: Transfer,
        pub ledger_entries: Vec<super::ledger::LedgerEntry>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransferListQuery {
        /// Only transfers where this member is source or destination.
        pub user_id: Option<i64>,
        pub page: Option<u64>,
        pub page_size: Option<u64>,
    }
}
