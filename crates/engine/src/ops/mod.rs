use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod accounts;
mod ledger;
mod transfers;

pub use transfers::{Resolution, TransferListFilter};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// The transaction is rolled back when it is dropped without a commit, so an
/// `Err` (or an early `?` return) never leaves partial writes behind.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of the points ledger.
///
/// The engine holds no state besides the storage handle, so it can be shared
/// across tasks (e.g. behind an `Arc`) and called concurrently.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}

#[cfg(test)]
pub(crate) async fn test_engine() -> Engine {
    use migration::MigratorTrait;
    use sea_orm::{ConnectOptions, Database};

    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}
