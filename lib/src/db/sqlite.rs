use std::str::FromStr;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Sqlite;
use sqlx::Transaction;
use tracing::debug;

use super::Batch;
use super::BatchImpl;
use super::Db;
use super::LookupEntry;
use super::StorageError;

/// `SQLite` persistence layer.
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Connect to the database. Accepts either a `sqlite:` url or a plain
    /// file path; the file is created if it does not exist.
    ///
    /// # Errors
    ///
    /// - If connect fails
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let opts = if url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(url).map_err(StorageError::Connect)?
        } else {
            SqliteConnectOptions::new().filename(url)
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts.create_if_missing(true))
            .await
            .map_err(StorageError::Connect)?;
        debug!(url, "Connected to SQLite");
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Db for SqliteDb {
    async fn begin(&self) -> Result<BatchImpl, StorageError> {
        let tx = self.pool.begin().await.map_err(StorageError::Begin)?;
        Ok(SqliteBatch { tx }.into())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open `SQLite` transaction.
pub struct SqliteBatch {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait::async_trait]
impl Batch for SqliteBatch {
    async fn insert(&mut self, entry: &LookupEntry) -> Result<(), StorageError> {
        sqlx::query(r"INSERT INTO lookups (name, addr) VALUES (?, ?)")
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

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn scratch_db(dir: &TempDir) -> SqliteDb {
        let path = dir.path().join("lookups.db");
        let db = SqliteDb::connect(path.to_str().unwrap()).await.unwrap();
        sqlx::query("CREATE TABLE lookups (name TEXT NOT NULL, addr TEXT NOT NULL)")
            .execute(db.pool())
            .await
            .unwrap();
        db
    }

    async fn rows(db: &SqliteDb) -> Vec<LookupEntry> {
        sqlx::query_as::<_, LookupEntry>("SELECT name, addr FROM lookups ORDER BY rowid")
            .fetch_all(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn commit_persists_rows() {
        let dir = TempDir::new().unwrap();
        let db = scratch_db(&dir).await;

        let foo = LookupEntry::new("foo", "10.0.0.1");
        let bar = LookupEntry::new("bar", "10.0.0.2");

        let mut batch = db.begin().await.unwrap();
        batch.insert(&foo).await.unwrap();
        batch.insert(&bar).await.unwrap();
        batch.commit().await.unwrap();

        assert_eq!(rows(&db).await, vec![foo, bar]);
    }

    #[tokio::test]
    async fn drop_rolls_back() {
        let dir = TempDir::new().unwrap();
        let db = scratch_db(&dir).await;

        let mut batch = db.begin().await.unwrap();
        batch.insert(&LookupEntry::new("foo", "10.0.0.1")).await.unwrap();
        drop(batch);

        assert!(rows(&db).await.is_empty());
    }

    #[tokio::test]
    async fn missing_table_fails_insert() {
        let dir = TempDir::new().unwrap();
        let db = SqliteDb::connect(&format!("sqlite://{}/empty.db", dir.path().display()))
            .await
            .unwrap();

        let mut batch = db.begin().await.unwrap();
        let result = batch.insert(&LookupEntry::new("foo", "10.0.0.1")).await;
        assert!(matches!(result, Err(StorageError::Insert { .. })));
    }
}
