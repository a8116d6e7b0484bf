//! Persistence: the `Store` seam and its PostgreSQL and in-memory backends.

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod seed;
pub mod store;

use derive_more::{Display, Error};
use tokio_postgres::error::SqlState;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Credentials, NewBilling, NewOrder, NewOrderLine, NewUser, PayOutcome, Store};

#[derive(Debug, Display, Error)]
pub enum StoreError {
    #[display("no connection available")]
    PoolExhausted,
    #[display("query timed out")]
    Timeout,
    #[display("unique constraint violated: {_0}")]
    Conflict(#[error(not(source))] String),
    #[display("{_0}")]
    Db(#[error(not(source))] String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) if db.code() == &SqlState::UNIQUE_VIOLATION => {
                StoreError::Conflict(db.constraint().unwrap_or("unique key").to_string())
            }
            _ => StoreError::Db(e.to_string()),
        }
    }
}
