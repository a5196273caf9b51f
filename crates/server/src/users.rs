//! Members API endpoints

use api_types::{
    PageQuery, PageResponse,
    ledger::LedgerEntry as LedgerEntryView,
    user::{User, UserNew, UserUpdate},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{ServerError, server::ServerState, transfers::ledger_entry_view};

fn user_view(account: engine::Account) -> User {
    User {
        id: account.id,
        member_code: account.member_code,
        membership_level: account.membership_level,
        name: account.name,
        surname: account.surname,
        phone: account.phone,
        email: account.email,
        registration_date: account.registration_date,
        remaining_points: account.remaining_points,
    }
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<Vec<User>>, ServerError> {
    let accounts = state.engine.list_accounts().await?;
    Ok(Json(accounts.into_iter().map(user_view).collect()))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<UserNew>,
) -> Result<(StatusCode, Json<User>), ServerError> {
    let new = engine::NewAccount {
        member_code: payload.member_code,
        membership_level: payload.membership_level,
        name: payload.name,
        surname: payload.surname,
        phone: payload.phone,
        email: payload.email,
        registration_date: payload.registration_date,
        remaining_points: payload.remaining_points,
    };

    let account = state.engine.create_account(new).await?;
    Ok((StatusCode::CREATED, Json(user_view(account))))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ServerError> {
    let account = state.engine.account_by_id(id).await?;
    Ok(Json(user_view(account)))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<User>, ServerError> {
    let update = engine::AccountUpdate {
        member_code: payload.member_code,
        membership_level: payload.membership_level,
        name: payload.name,
        surname: payload.surname,
        phone: payload.phone,
        email: payload.email,
        registration_date: payload.registration_date,
    };

    let account = state.engine.update_account(id, update).await?;
    Ok(Json(user_view(account)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_account(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ledger(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<LedgerEntryView>>, ServerError> {
    let page = engine::PageRequest::new(query.page.unwrap_or(1), query.page_size.unwrap_or(0));

    let paged = state.engine.ledger_for_account(id, page).await?;
    Ok(Json(PageResponse {
        data: paged.items.into_iter().map(ledger_entry_view).collect(),
        page: paged.page,
        page_size: paged.page_size,
        total: paged.total,
    }))
}
