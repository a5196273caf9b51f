//! Account store and member registration.
//!
//! Balance reads and writes used by transfers take a `&DatabaseTransaction`,
//! so they can only run inside a caller's unit of work. Member CRUD opens its
//! own transaction.

use chrono::Utc;
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait, prelude::*,
};

use crate::{
    Account, AccountUpdate, EngineError, LedgerEventType, NewAccount, ResultEngine, accounts,
    ledger::{self, NewLedgerEntry},
    transfers,
    util::normalize_required_text,
};

use super::{Engine, with_tx};

const OPENING_BALANCE_REFERENCE: &str = "registration";

impl Engine {
    /// Load an account inside a unit of work.
    pub(crate) async fn account(&self, db_tx: &DatabaseTransaction, id: i64) -> ResultEngine<Account> {
        accounts::Entity::find_by_id(id)
            .one(db_tx)
            .await?
            .map(Account::from)
            .ok_or_else(|| EngineError::KeyNotFound(format!("user {id} not exists")))
    }

    /// Apply a signed delta to an account balance and return the new balance.
    ///
    /// The write is a compare-and-set on the balance read in the same unit:
    /// if another writer changed it in between, nothing is written and
    /// [`EngineError::StaleBalance`] is returned so the unit can be retried.
    pub(crate) async fn apply_delta(
        &self,
        db_tx: &DatabaseTransaction,
        id: i64,
        delta: i64,
    ) -> ResultEngine<i64> {
        let current = self.account(db_tx, id).await?.remaining_points;
        let new_balance = current
            .checked_add(delta)
            .ok_or_else(|| EngineError::BalanceOverflow(format!("user {id}")))?;
        if new_balance < 0 {
            return Err(EngineError::InsufficientPoints(format!(
                "user {id} has {current} points, needs {}",
                delta.unsigned_abs()
            )));
        }

        store_balance(db_tx, id, current, new_balance).await?;
        Ok(new_balance)
    }

    /// Register a member.
    ///
    /// A positive initial balance is recorded as an `opening_balance` ledger
    /// entry in the same transaction.
    pub async fn create_account(&self, new: NewAccount) -> ResultEngine<Account> {
        let member_code = normalize_required_text(&new.member_code, "member code")?;
        if new.remaining_points < 0 {
            return Err(EngineError::InvalidAmount(
                "remaining_points must be >= 0".to_string(),
            ));
        }
        let registration_date = new
            .registration_date
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

        with_tx!(self, |db_tx| {
            self.require_member_code_free(&db_tx, &member_code, None)
                .await?;

            let model = accounts::ActiveModel {
                id: ActiveValue::NotSet,
                member_code: ActiveValue::Set(member_code.clone()),
                membership_level: ActiveValue::Set(new.membership_level),
                name: ActiveValue::Set(new.name),
                surname: ActiveValue::Set(new.surname),
                phone: ActiveValue::Set(new.phone),
                email: ActiveValue::Set(new.email),
                registration_date: ActiveValue::Set(registration_date),
                remaining_points: ActiveValue::Set(new.remaining_points),
            }
            .insert(&db_tx)
            .await
            .map_err(|err| member_code_conflict(err, &member_code))?;

            if model.remaining_points > 0 {
                self.append_ledger_entry(
                    &db_tx,
                    &NewLedgerEntry {
                        user_id: model.id,
                        change: model.remaining_points,
                        balance_after: model.remaining_points,
                        event_type: LedgerEventType::OpeningBalance,
                        transfer_id: None,
                        reference: Some(OPENING_BALANCE_REFERENCE.to_string()),
                        created_at: Utc::now(),
                    },
                )
                .await?;
            }

            tracing::info!(user_id = model.id, member_code = %model.member_code, "member registered");
            Ok(Account::from(model))
        })
    }

    pub async fn account_by_id(&self, id: i64) -> ResultEngine<Account> {
        accounts::Entity::find_by_id(id)
            .one(&self.database)
            .await?
            .map(Account::from)
            .ok_or_else(|| EngineError::KeyNotFound(format!("user {id} not exists")))
    }

    /// All accounts, newest registration first.
    pub async fn list_accounts(&self) -> ResultEngine<Vec<Account>> {
        let models = accounts::Entity::find()
            .order_by_desc(accounts::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Account::from).collect())
    }

    /// Update profile fields. The balance is never touched here.
    pub async fn update_account(&self, id: i64, update: AccountUpdate) -> ResultEngine<Account> {
        let member_code = update
            .member_code
            .as_deref()
            .map(|code| normalize_required_text(code, "member code"))
            .transpose()?;

        with_tx!(self, |db_tx| {
            let existing = accounts::Entity::find_by_id(id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("user {id} not exists")))?;

            let mut model: accounts::ActiveModel = existing.clone().into();
            if let Some(code) = member_code.clone() {
                self.require_member_code_free(&db_tx, &code, Some(id))
                    .await?;
                model.member_code = ActiveValue::Set(code);
            }
            if let Some(level) = update.membership_level {
                model.membership_level = ActiveValue::Set(level);
            }
            if let Some(name) = update.name {
                model.name = ActiveValue::Set(name);
            }
            if let Some(surname) = update.surname {
                model.surname = ActiveValue::Set(surname);
            }
            if let Some(phone) = update.phone {
                model.phone = ActiveValue::Set(phone);
            }
            if let Some(email) = update.email {
                model.email = ActiveValue::Set(email);
            }
            if let Some(date) = update.registration_date {
                model.registration_date = ActiveValue::Set(date);
            }

            if !model.is_changed() {
                return Ok(Account::from(existing));
            }

            let updated = model.update(&db_tx).await.map_err(|err| {
                member_code_conflict(err, member_code.as_deref().unwrap_or_default())
            })?;
            Ok(Account::from(updated))
        })
    }

    /// Delete an account that no transfer or ledger entry references.
    ///
    /// Referenced accounts are kept so the ledger stays complete; the call
    /// fails with [`EngineError::AccountInUse`].
    pub async fn delete_account(&self, id: i64) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let existing = accounts::Entity::find_by_id(id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("user {id} not exists")))?;

            let transfer_refs = transfers::Entity::find()
                .filter(
                    Condition::any()
                        .add(transfers::Column::FromUserId.eq(id))
                        .add(transfers::Column::ToUserId.eq(id)),
                )
                .count(&db_tx)
                .await?;
            let ledger_refs = ledger::Entity::find()
                .filter(ledger::Column::UserId.eq(id))
                .count(&db_tx)
                .await?;
            if transfer_refs > 0 || ledger_refs > 0 {
                return Err(EngineError::AccountInUse(format!(
                    "user {id} is referenced by {transfer_refs} transfers and {ledger_refs} ledger entries"
                )));
            }

            accounts::Entity::delete_by_id(existing.id)
                .exec(&db_tx)
                .await?;
            tracing::info!(user_id = id, "member deleted");
            Ok(())
        })
    }

    async fn require_member_code_free(
        &self,
        db_tx: &DatabaseTransaction,
        member_code: &str,
        except_id: Option<i64>,
    ) -> ResultEngine<()> {
        let mut query =
            accounts::Entity::find().filter(accounts::Column::MemberCode.eq(member_code));
        if let Some(id) = except_id {
            query = query.filter(accounts::Column::Id.ne(id));
        }
        if query.one(db_tx).await?.is_some() {
            return Err(EngineError::ExistingKey(format!("member code {member_code}")));
        }
        Ok(())
    }
}

fn member_code_conflict(err: DbErr, member_code: &str) -> EngineError {
    if crate::error::is_unique_violation(&err) {
        return EngineError::ExistingKey(format!("member code {member_code}"));
    }
    EngineError::Database(err)
}

/// Write `new` only if the stored balance still equals `expected`.
async fn store_balance(
    db_tx: &DatabaseTransaction,
    id: i64,
    expected: i64,
    new: i64,
) -> ResultEngine<()> {
    let result = accounts::Entity::update_many()
        .col_expr(accounts::Column::RemainingPoints, Expr::value(new))
        .filter(accounts::Column::Id.eq(id))
        .filter(accounts::Column::RemainingPoints.eq(expected))
        .exec(db_tx)
        .await?;
    if result.rows_affected != 1 {
        return Err(EngineError::StaleBalance(format!("user {id}")));
    }
    Ok(())
}
