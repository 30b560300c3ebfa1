mod postgres;
mod sqlite;

use async_trait::async_trait;
use enum_dispatch::enum_dispatch;

pub use self::postgres::PostgresBatch;
pub use self::postgres::PostgresDb;
pub use self::sqlite::SqliteBatch;
pub use self::sqlite::SqliteDb;

/// Failures of the storage layer. None of these are recovered from; they end
/// the run and take the uncommitted transaction with them.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),

    #[error("unable to connect to the database")]
    Connect(#[source] sqlx::Error),

    #[error("unable to begin a transaction")]
    Begin(#[source] sqlx::Error),

    #[error("unable to insert lookup {name} -> {addr}")]
    Insert {
        name: String,
        addr: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("unable to commit lookups")]
    Commit(#[source] sqlx::Error),
}

/// A relational store holding the `lookups` table.
#[async_trait]
#[enum_dispatch]
pub trait Db {
    /// Opens the transaction that all rows of a run are appended to.
    async fn begin(&self) -> Result<BatchImpl, StorageError>;

    /// Releases the connection.
    async fn close(&self);
}

/// One open transaction against the `lookups` table.
///
/// Dropping a batch without calling [`Batch::commit`] rolls back every row
/// inserted through it.
#[async_trait]
#[enum_dispatch]
pub trait Batch {
    /// Appends a [`LookupEntry`] to the transaction.
    async fn insert(&mut self, entry: &LookupEntry) -> Result<(), StorageError>;

    /// Commits every row appended so far.
    async fn commit(self) -> Result<(), StorageError>;
}

#[enum_dispatch(Db)]
#[derive(Debug, Clone)]
pub enum DbImpl {
    Sqlite(SqliteDb),
    Postgres(PostgresDb),
}

#[enum_dispatch(Batch)]
pub enum BatchImpl {
    Sqlite(SqliteBatch),
    Postgres(PostgresBatch),
}

impl DbImpl {
    /// Connects to the database at `url`. Without a url, PostgreSQL is used
    /// with connection parameters taken from the `PG*` environment variables.
    ///
    /// # Errors
    ///
    /// - If the url names no supported backend
    /// - If the connection fails
    pub async fn try_new(url: Option<&str>) -> Result<Self, StorageError> {
        let Some(url) = url else {
            let db = PostgresDb::connect(None).await?;
            return Ok(db.into());
        };

        if url.starts_with("sqlite:") || url.ends_with(".db") {
            let db = SqliteDb::connect(url).await?;
            return Ok(db.into());
        }

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let db = PostgresDb::connect(Some(url)).await?;
            return Ok(db.into());
        }

        Err(StorageError::UnsupportedUrl(url.to_owned()))
    }
}

/// One resolved address of a queried name, stored as a row of `lookups`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, sqlx::FromRow)]
pub struct LookupEntry {
    /// The name exactly as it was queried.
    pub name: String,
    /// Dotted-quad IPv4 address.
    pub addr: String,
}

impl LookupEntry {
    pub fn new(name: impl Into<String>, addr: impl ToString) -> Self {
        Self {
            name: name.into(),
            addr: addr.to_string(),
        }
    }
}
