//! Transfer engine.
//!
//! A transfer runs as one database transaction:
//!
//! 1. idempotency fast path (a committed transfer with the key is replayed)
//! 2. load both accounts and check the source balance
//! 3. insert the transfer row as `processing`
//! 4. debit the source and credit the destination
//! 5. append the `transfer_out` / `transfer_in` ledger pair
//! 6. mark the transfer `completed`
//!
//! Any error drops the transaction, so either all of it is committed or
//! nothing is. The unique index on `idempotency_key` is what decides between
//! concurrent submissions of the same key: the loser rolls back and replays
//! the winner's transfer (see [`idempotency`]).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ErrorClass, LedgerEventType, ResultEngine, Transfer, TransferCmd,
    TransferOutcome, TransferReceipt, TransferStatus,
    error::is_unique_violation,
    ledger::NewLedgerEntry,
    transfers,
    util::{normalize_idempotency_key, normalize_optional_text},
};

use super::{Engine, with_tx};

mod idempotency;
mod list;

pub use idempotency::Resolution;
pub use list::TransferListFilter;

/// Units aborted by a concurrent balance change are retried this many times.
const MAX_STALE_ATTEMPTS: u32 = 3;

/// A validated transfer request.
#[derive(Clone, Debug)]
pub(super) struct TransferRequest {
    from_user_id: i64,
    to_user_id: i64,
    amount: i64,
    note: Option<String>,
    idempotency_key: String,
}

impl TransferRequest {
    fn validate(cmd: TransferCmd) -> ResultEngine<Self> {
        if cmd.from_user_id == cmd.to_user_id {
            return Err(EngineError::InvalidTransfer(
                "cannot transfer to self".to_string(),
            ));
        }
        if cmd.amount <= 0 {
            return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
        }
        let idempotency_key = match cmd.idempotency_key.as_deref() {
            Some(key) => normalize_idempotency_key(key)?,
            None => Uuid::new_v4().to_string(),
        };
        Ok(Self {
            from_user_id: cmd.from_user_id,
            to_user_id: cmd.to_user_id,
            amount: cmd.amount,
            note: normalize_optional_text(cmd.note.as_deref()),
            idempotency_key,
        })
    }
}

impl Engine {
    /// Execute a transfer exactly once per idempotency key.
    ///
    /// Returns [`TransferOutcome::Created`] when this call moved the points and
    /// [`TransferOutcome::AlreadyCompleted`] when a transfer with the same key
    /// had already been committed.
    pub async fn execute_transfer(&self, cmd: TransferCmd) -> ResultEngine<TransferOutcome> {
        let request = TransferRequest::validate(cmd)?;

        match retry_on_stale(MAX_STALE_ATTEMPTS, || self.run_transfer_unit(&request)).await {
            Ok(outcome) => {
                let transfer = &outcome.receipt().transfer;
                tracing::info!(
                    transfer_id = transfer.id,
                    idempotency_key = %transfer.idempotency_key,
                    from_user_id = transfer.from_user_id,
                    to_user_id = transfer.to_user_id,
                    amount = transfer.amount,
                    replay = outcome.is_replay(),
                    "transfer resolved"
                );
                Ok(outcome)
            }
            Err(err) if lost_key_race(&err) => self.replay_after_conflict(&request).await,
            Err(err) => {
                match err.class() {
                    ErrorClass::Internal => tracing::error!(
                        idempotency_key = %request.idempotency_key,
                        "transfer aborted: {err}"
                    ),
                    _ => tracing::warn!(
                        idempotency_key = %request.idempotency_key,
                        "transfer rejected: {err}"
                    ),
                }
                Err(err)
            }
        }
    }

    async fn run_transfer_unit(&self, request: &TransferRequest) -> ResultEngine<TransferOutcome> {
        with_tx!(self, |db_tx| self.transfer_unit(&db_tx, request).await)
    }

    async fn transfer_unit(
        &self,
        db_tx: &DatabaseTransaction,
        request: &TransferRequest,
    ) -> ResultEngine<TransferOutcome> {
        if let Some(existing) =
            idempotency::find_transfer_model(db_tx, &request.idempotency_key).await?
        {
            let receipt = idempotency::replay(db_tx, existing, request).await?;
            return Ok(TransferOutcome::AlreadyCompleted(receipt));
        }

        let from = self.account(db_tx, request.from_user_id).await?;
        let to = self.account(db_tx, request.to_user_id).await?;
        if from.remaining_points < request.amount {
            return Err(EngineError::InsufficientPoints(format!(
                "user {} has {} points, needs {}",
                from.id, from.remaining_points, request.amount
            )));
        }

        let now = Utc::now();
        let inserted = insert_processing(db_tx, request, now).await?;

        let from_balance = self.apply_delta(db_tx, from.id, -request.amount).await?;
        let to_balance = self.apply_delta(db_tx, to.id, request.amount).await?;

        let transfer_out = self
            .append_ledger_entry(
                db_tx,
                &NewLedgerEntry {
                    user_id: from.id,
                    change: -request.amount,
                    balance_after: from_balance,
                    event_type: LedgerEventType::TransferOut,
                    transfer_id: Some(inserted.id),
                    reference: Some(request.idempotency_key.clone()),
                    created_at: now,
                },
            )
            .await?;
        let transfer_in = self
            .append_ledger_entry(
                db_tx,
                &NewLedgerEntry {
                    user_id: to.id,
                    change: request.amount,
                    balance_after: to_balance,
                    event_type: LedgerEventType::TransferIn,
                    transfer_id: Some(inserted.id),
                    reference: Some(request.idempotency_key.clone()),
                    created_at: now,
                },
            )
            .await?;

        let completed_at = Utc::now();
        let mut completed: transfers::ActiveModel = inserted.into();
        completed.status = ActiveValue::Set(TransferStatus::Completed.as_str().to_string());
        completed.completed_at = ActiveValue::Set(Some(completed_at));
        completed.updated_at = ActiveValue::Set(completed_at);
        let completed = completed.update(db_tx).await?;

        Ok(TransferOutcome::Created(TransferReceipt {
            transfer: Transfer::try_from(completed)?,
            ledger_entries: vec![transfer_out, transfer_in],
        }))
    }
}

/// Insert the `processing` row that claims `request.idempotency_key`.
///
/// A unique violation means another unit already claimed the key and is
/// reported as [`EngineError::DuplicateKey`].
async fn insert_processing(
    db_tx: &DatabaseTransaction,
    request: &TransferRequest,
    now: DateTime<Utc>,
) -> ResultEngine<transfers::Model> {
    let processing = transfers::ActiveModel {
        id: ActiveValue::NotSet,
        idempotency_key: ActiveValue::Set(request.idempotency_key.clone()),
        from_user_id: ActiveValue::Set(request.from_user_id),
        to_user_id: ActiveValue::Set(request.to_user_id),
        amount: ActiveValue::Set(request.amount),
        status: ActiveValue::Set(TransferStatus::Processing.as_str().to_string()),
        note: ActiveValue::Set(request.note.clone()),
        fail_reason: ActiveValue::Set(None),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
        completed_at: ActiveValue::Set(None),
    };
    match processing.insert(db_tx).await {
        Ok(model) => Ok(model),
        Err(err) if is_unique_violation(&err) => {
            Err(EngineError::DuplicateKey(request.idempotency_key.clone()))
        }
        Err(err) => Err(err.into()),
    }
}

/// Whether a unit failed because another unit committed the same key first,
/// either at insert time or at commit time.
fn lost_key_race(err: &EngineError) -> bool {
    match err {
        EngineError::DuplicateKey(_) => true,
        EngineError::Database(db_err) => is_unique_violation(db_err),
        _ => false,
    }
}

/// Run `unit` again while it fails with [`EngineError::StaleBalance`], up to
/// `max_attempts` runs in total.
async fn retry_on_stale<T, F, Fut>(max_attempts: u32, mut unit: F) -> ResultEngine<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ResultEngine<T>>,
{
    let mut attempt = 1;
    loop {
        match unit().await {
            Err(EngineError::StaleBalance(reason)) if attempt < max_attempts => {
                tracing::debug!(attempt, %reason, "retrying transfer after concurrent update");
                attempt += 1;
            }
            result => return result,
        }
    }
}
