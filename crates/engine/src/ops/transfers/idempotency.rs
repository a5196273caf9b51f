//! Idempotency resolver.
//!
//! Maps an idempotency key to at most one committed transfer. The unique
//! index on `transfers.idempotency_key` is the arbiter; the lookups here only
//! turn "already there" into a typed answer.

use sea_orm::{ConnectionTrait, QueryFilter, prelude::*};

use crate::{
    EngineError, ResultEngine, Transfer, TransferOutcome, TransferReceipt, TransferStatus,
    transfers,
};

use super::super::{Engine, ledger::ledger_rows_for_transfer};
use super::TransferRequest;

/// Answer of [`Engine::resolve_transfer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Committed(Transfer),
    NotFound,
}

pub(super) async fn find_transfer_model<C: ConnectionTrait>(
    conn: &C,
    idempotency_key: &str,
) -> ResultEngine<Option<transfers::Model>> {
    Ok(transfers::Entity::find()
        .filter(transfers::Column::IdempotencyKey.eq(idempotency_key))
        .one(conn)
        .await?)
}

/// Build the answer for a resubmitted key.
///
/// The stored transfer must describe the same movement as the new request;
/// reusing a key for a different movement is a conflict, not a replay.
pub(super) async fn replay<C: ConnectionTrait>(
    conn: &C,
    existing: transfers::Model,
    request: &TransferRequest,
) -> ResultEngine<TransferReceipt> {
    let transfer = Transfer::try_from(existing)?;
    if !transfer.matches_request(request.from_user_id, request.to_user_id, request.amount) {
        return Err(EngineError::IdempotencyMismatch(transfer.idempotency_key));
    }
    if transfer.status == TransferStatus::Processing {
        return Err(EngineError::TransferInProgress(transfer.idempotency_key));
    }
    let ledger_entries = ledger_rows_for_transfer(conn, transfer.id).await?;
    Ok(TransferReceipt {
        transfer,
        ledger_entries,
    })
}

impl Engine {
    /// Look up the transfer committed under `idempotency_key`.
    pub async fn resolve_transfer(&self, idempotency_key: &str) -> ResultEngine<Resolution> {
        match find_transfer_model(&self.database, idempotency_key).await? {
            Some(model) => Ok(Resolution::Committed(Transfer::try_from(model)?)),
            None => Ok(Resolution::NotFound),
        }
    }

    /// A transfer and its ledger entries, by idempotency key.
    pub async fn transfer_by_key(&self, idempotency_key: &str) -> ResultEngine<TransferReceipt> {
        let transfer = match self.resolve_transfer(idempotency_key).await? {
            Resolution::Committed(transfer) => transfer,
            Resolution::NotFound => {
                return Err(EngineError::KeyNotFound(format!(
                    "transfer {idempotency_key} not exists"
                )));
            }
        };
        let ledger_entries = ledger_rows_for_transfer(&self.database, transfer.id).await?;
        Ok(TransferReceipt {
            transfer,
            ledger_entries,
        })
    }

    /// Called after our unit lost the race on the idempotency key and was
    /// rolled back: answer with the transfer that won.
    pub(super) async fn replay_after_conflict(
        &self,
        request: &TransferRequest,
    ) -> ResultEngine<TransferOutcome> {
        tracing::info!(
            idempotency_key = %request.idempotency_key,
            "idempotency key conflict, replaying committed transfer"
        );
        let Some(existing) = find_transfer_model(&self.database, &request.idempotency_key).await?
        else {
            // The competing unit has not committed (or rolled back); the
            // caller can retry with the same key.
            return Err(EngineError::TransferInProgress(
                request.idempotency_key.clone(),
            ));
        };
        let receipt = replay(&self.database, existing, request).await?;
        Ok(TransferOutcome::AlreadyCompleted(receipt))
    }
}
