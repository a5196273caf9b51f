//! Transfers API endpoints

use api_types::{
    PageResponse,
    ledger::{EventType, LedgerEntry as LedgerEntryView},
    transfer::{
        Transfer as TransferView, TransferListQuery, TransferNew, TransferResponse,
        TransferStatus as ApiStatus,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;

use crate::{
    ServerError,
    server::{IDEMPOTENCY_KEY_HEADER, IdempotencyKey, ServerState},
};

fn map_status(status: engine::TransferStatus) -> ApiStatus {
    match status {
        engine::TransferStatus::Processing => ApiStatus::Processing,
        engine::TransferStatus::Completed => ApiStatus::Completed,
        engine::TransferStatus::Failed => ApiStatus::Failed,
    }
}

fn map_event_type(event_type: engine::LedgerEventType) -> EventType {
    match event_type {
        engine::LedgerEventType::TransferOut => EventType::TransferOut,
        engine::LedgerEventType::TransferIn => EventType::TransferIn,
        engine::LedgerEventType::OpeningBalance => EventType::OpeningBalance,
    }
}

pub(crate) fn ledger_entry_view(entry: engine::LedgerEntry) -> LedgerEntryView {
    LedgerEntryView {
        id: entry.id,
        user_id: entry.user_id,
        change: entry.change,
        balance_after: entry.balance_after,
        event_type: map_event_type(entry.event_type),
        transfer_id: entry.transfer_id,
        reference: entry.reference,
        metadata: entry.metadata,
        created_at: entry.created_at,
    }
}

fn transfer_view(transfer: engine::Transfer) -> TransferView {
    TransferView {
        id: transfer.id,
        idempotency_key: transfer.idempotency_key,
        from_user_id: transfer.from_user_id,
        to_user_id: transfer.to_user_id,
        amount: transfer.amount,
        status: map_status(transfer.status),
        note: transfer.note,
        fail_reason: transfer.fail_reason,
        created_at: transfer.created_at,
        updated_at: transfer.updated_at,
        completed_at: transfer.completed_at,
    }
}

fn receipt_view(receipt: engine::TransferReceipt) -> TransferResponse {
    TransferResponse {
        transfer: transfer_view(receipt.transfer),
        ledger_entries: receipt
            .ledger_entries
            .into_iter()
            .map(ledger_entry_view)
            .collect(),
    }
}

/// Header value echoing the key the transfer was stored under.
fn idempotency_headers(key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(key) {
        Ok(value) => {
            headers.insert(IDEMPOTENCY_KEY_HEADER.clone(), value);
        }
        Err(_) => tracing::warn!("idempotency key is not a valid header value, not echoed"),
    }
    headers
}

pub async fn create(
    State(state): State<ServerState>,
    key_header: Option<TypedHeader<IdempotencyKey>>,
    Json(payload): Json<TransferNew>,
) -> Result<Response, ServerError> {
    let engine = &state.engine;

    let mut cmd = engine::TransferCmd::new(payload.from_user_id, payload.to_user_id, payload.amount);
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    let key = key_header
        .map(|TypedHeader(IdempotencyKey(key))| key)
        .or(payload.idempotency_key);
    if let Some(key) = key {
        cmd = cmd.idempotency_key(key);
    }

    let outcome = engine.execute_transfer(cmd).await?;
    let status = if outcome.is_replay() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let receipt = outcome.into_receipt();
    let headers = idempotency_headers(&receipt.transfer.idempotency_key);

    Ok((status, headers, Json(receipt_view(receipt))).into_response())
}

pub async fn get(
    State(state): State<ServerState>,
    Path(key): Path<String>,
) -> Result<Json<TransferResponse>, ServerError> {
    let receipt = state.engine.transfer_by_key(&key).await?;
    Ok(Json(receipt_view(receipt)))
}

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<TransferListQuery>,
) -> Result<Json<PageResponse<TransferView>>, ServerError> {
    let filter = engine::TransferListFilter {
        user_id: query.user_id,
    };
    let page = engine::PageRequest::new(query.page.unwrap_or(1), query.page_size.unwrap_or(0));

    let paged = state.engine.list_transfers(&filter, page).await?;
    Ok(Json(PageResponse {
        data: paged.items.into_iter().map(transfer_view).collect(),
        page: paged.page,
        page_size: paged.page_size,
        total: paged.total,
    }))
}
