//! Points ledger engine.
//!
//! The engine owns member balances, point transfers and the append-only
//! point ledger. Every balance change happens inside a single database
//! transaction together with the ledger rows describing it.

pub use accounts::Account;
pub use commands::{AccountUpdate, NewAccount, TransferCmd};
pub use error::{EngineError, ErrorClass};
pub use ledger::{LedgerEntry, LedgerEventType};
pub use ops::{Engine, EngineBuilder, Resolution, TransferListFilter};
pub use paging::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest, Paged};
pub use transfers::{Transfer, TransferOutcome, TransferReceipt, TransferStatus};

mod accounts;
mod commands;
mod error;
mod ledger;
mod ops;
mod paging;
mod transfers;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
