//! Ledger store.
//!
//! Insert-only: entries are appended inside a transfer (or registration)
//! unit and never updated or deleted afterwards.

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseTransaction, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};

use crate::{
    EngineError, LedgerEntry, PageRequest, Paged, ResultEngine, accounts,
    ledger::{self, NewLedgerEntry},
};

use super::{Engine, with_tx};

impl Engine {
    pub(crate) async fn append_ledger_entry(
        &self,
        db_tx: &DatabaseTransaction,
        entry: &NewLedgerEntry,
    ) -> ResultEngine<LedgerEntry> {
        let model = ledger::ActiveModel::from(entry).insert(db_tx).await?;
        LedgerEntry::try_from(model)
    }

    /// Ledger entries produced by a transfer, in insertion order
    /// (`transfer_out` first).
    pub async fn ledger_for_transfer(&self, transfer_id: i64) -> ResultEngine<Vec<LedgerEntry>> {
        ledger_rows_for_transfer(&self.database, transfer_id).await
    }

    /// One page of an account's ledger, newest first.
    pub async fn ledger_for_account(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> ResultEngine<Paged<LedgerEntry>> {
        with_tx!(self, |db_tx| {
            if accounts::Entity::find_by_id(user_id)
                .one(&db_tx)
                .await?
                .is_none()
            {
                return Err(EngineError::KeyNotFound(format!(
                    "user {user_id} not exists"
                )));
            }

            let query = ledger::Entity::find().filter(ledger::Column::UserId.eq(user_id));
            let total = query.clone().count(&db_tx).await?;
            let models = query
                .order_by_desc(ledger::Column::CreatedAt)
                .order_by_desc(ledger::Column::Id)
                .offset(page.offset())
                .limit(page.page_size())
                .all(&db_tx)
                .await?;
            let items = models
                .into_iter()
                .map(LedgerEntry::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            Ok(Paged {
                items,
                page: page.page(),
                page_size: page.page_size(),
                total,
            })
        })
    }
}

pub(super) async fn ledger_rows_for_transfer<C: ConnectionTrait>(
    conn: &C,
    transfer_id: i64,
) -> ResultEngine<Vec<LedgerEntry>> {
    ledger::Entity::find()
        .filter(ledger::Column::TransferId.eq(transfer_id))
        .order_by_asc(ledger::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(LedgerEntry::try_from)
        .collect()
}
