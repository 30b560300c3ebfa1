use std::str::FromStr;

use sqlx::postgres::PgConnectOptions;
use sqlx::postgres::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::Postgres;
use sqlx::Transaction;
use tracing::debug;

use super::Batch;
use super::BatchImpl;
use super::Db;
use super::LookupEntry;
use super::StorageError;

/// `PostgreSQL` persistence layer.
#[derive(Debug, Clone)]
pub struct PostgresDb {
    pool: PgPool,
}

impl PostgresDb {
    /// Connect to the database. Anything the url leaves out, or everything
    /// when there is no url, comes from the libpq environment variables
    /// (`PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`, ...).
    ///
    /// # Errors
    ///
    /// - If the url does not parse
    /// - If connect fails
    pub async fn connect(url: Option<&str>) -> Result<Self, StorageError> {
        let opts = match url {
            Some(url) => PgConnectOptions::from_str(url).map_err(StorageError::Connect)?,
            None => PgConnectOptions::new(),
        };
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(StorageError::Connect)?;
        debug!("Connected to PostgreSQL");
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Db for PostgresDb {
    async fn begin(&self) -> Result<BatchImpl, StorageError> {
        let tx = self.pool.begin().await.map_err(StorageError::Begin)?;
        Ok(PostgresBatch { tx }.into())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open `PostgreSQL` transaction.
pub struct PostgresBatch {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl Batch for PostgresBatch {
    async fn insert(&mut self, entry: &LookupEntry) -> Result<(), StorageError> {
        sqlx::query(r"INSERT INTO lookups (name, addr) VALUES ($1, $2)")
            .bind(&entry.name)
            .bind(&entry.addr)
            .execute(&mut *self.tx)
            .await
            .map_err(|source| StorageError::Insert {
                name: entry.name.clone(),
                addr: entry.addr.clone(),
                source,
            })?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await.map_err(StorageError::Commit)
    }
}
