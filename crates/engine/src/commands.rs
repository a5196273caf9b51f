//! Command structs for engine operations.
//!
//! These types group parameters for write operations (transfer, member
//! registration and update), keeping call sites readable and avoiding long
//! argument lists.

/// Move points from one account to another.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub amount: i64,
    pub note: Option<String>,
    /// Client supplied key. When absent the engine generates one.
    pub idempotency_key: Option<String>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(from_user_id: i64, to_user_id: i64, amount: i64) -> Self {
        Self {
            from_user_id,
            to_user_id,
            amount,
            note: None,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Register a member account.
#[derive(Clone, Debug, Default)]
pub struct NewAccount {
    pub member_code: String,
    pub membership_level: String,
    pub name: String,
    pub surname: String,
    pub phone: String,
    pub email: String,
    /// Defaults to today (UTC) when absent.
    pub registration_date: Option<String>,
    pub remaining_points: i64,
}

impl NewAccount {
    #[must_use]
    pub fn new(member_code: impl Into<String>, remaining_points: i64) -> Self {
        Self {
            member_code: member_code.into(),
            remaining_points,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>, surname: impl Into<String>) -> Self {
        self.name = name.into();
        self.surname = surname.into();
        self
    }

    #[must_use]
    pub fn membership_level(mut self, level: impl Into<String>) -> Self {
        self.membership_level = level.into();
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    #[must_use]
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }
}

/// Update the profile of a member. `None` fields are left untouched.
///
/// The balance is deliberately absent: it only changes through transfers.
#[derive(Clone, Debug, Default)]
pub struct AccountUpdate {
    pub member_code: Option<String>,
    pub membership_level: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub registration_date: Option<String>,
}
