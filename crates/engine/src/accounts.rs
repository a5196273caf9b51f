//! Member accounts.
//!
//! An [`Account`] is a registered member together with the current point
//! balance. Accounts are stored in the `users` table; the balance column
//! (`remaining_points`) is only ever mutated by the transfer engine inside a
//! database transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// Human-facing member code, unique across accounts.
    pub member_code: String,
    pub membership_level: String,
    pub name: String,
    pub surname: String,
    pub phone: String,
    pub email: String,
    /// Registration day, `YYYY-MM-DD`.
    pub registration_date: String,
    /// Current balance. Never negative.
    pub remaining_points: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub member_code: String,
    pub membership_level: String,
    pub name: String,
    pub surname: String,
    pub phone: String,
    pub email: String,
    pub registration_date: String,
    pub remaining_points: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Account {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            member_code: model.member_code,
            membership_level: model.membership_level,
            name: model.name,
            surname: model.surname,
            phone: model.phone,
            email: model.email,
            registration_date: model.registration_date,
            remaining_points: model.remaining_points,
        }
    }
}
