//! The SQLite ledger store and every operation of the ledger and query engine.
//!
//! [`Db`] owns a connection pool and the single in-process writer lock. The operations are
//! spread across submodules by entity, each adding an `impl Db` block:
//! - `accounts`: account CRUD, balances and the opening-balance write
//! - `categories`: the category directory
//! - `transactions`: movements, transfers, mirrors, patches
//! - `search`: filtered, sorted, paginated queries with aggregates

mod accounts;
mod categories;
mod guard;
pub(crate) mod migrations;
mod search;
mod transactions;

use crate::error::{Error, ErrorType, IntoResult};
use crate::model::LastPage;
use crate::Result;
use anyhow::Context;
pub(crate) use guard::UnitOfWork;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// The page size used when neither the caller nor the configuration provides one.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

const MAX_CONNECTIONS: u32 = 4;

/// Query settings that come from configuration.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Settings {
    pub page_size: u32,
    pub last_page: LastPage,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            last_page: LastPage::default(),
        }
    }
}

/// A handle to the ledger database. Cloning is cheap and every clone shares the pool and the
/// writer lock.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
    settings: Settings,
}

impl Db {
    /// Creates a new ledger at `path`. Fails if a file already exists there.
    pub async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::new(
                ErrorType::Config,
                format!("A database already exists at '{}'", path.display()),
            ));
        }
        let pool = connect(path, true).await?;
        migrations::bootstrap(&pool)
            .await
            .pub_result(ErrorType::Storage)?;
        migrations::run(&pool, 0, migrations::CURRENT_VERSION)
            .await
            .pub_result(ErrorType::Storage)?;
        debug!("Created ledger database at {}", path.display());
        Ok(Self::new(pool))
    }

    /// Opens the existing ledger at `path` and brings its schema up to date.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::new(
                ErrorType::Config,
                format!("The database file is missing '{}'", path.display()),
            ));
        }
        let pool = connect(path, false).await?;
        let version = migrations::current_version(&pool)
            .await
            .pub_result(ErrorType::Storage)?;
        if version > migrations::CURRENT_VERSION {
            return Err(Error::new(
                ErrorType::Config,
                format!(
                    "The database schema is version {version} but this program only knows up to \
                    version {}",
                    migrations::CURRENT_VERSION
                ),
            ));
        }
        migrations::run(&pool, version, migrations::CURRENT_VERSION)
            .await
            .pub_result(ErrorType::Storage)?;
        debug!("Loaded ledger database at {}", path.display());
        Ok(Self::new(pool))
    }

    fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Arc::new(Mutex::new(())),
            settings: Settings::default(),
        }
    }

    /// Replaces the query settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await
    }

    /// Starts a write: waits for the writer lock, then opens a database transaction.
    pub(crate) async fn unit_of_work(&self) -> Result<UnitOfWork> {
        UnitOfWork::begin(&self.pool, self.writer.clone()).await
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Unable to open SQLite database at '{}'", path.display()))
        .pub_result(ErrorType::Storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.sqlite");
        let db = Db::init(&path).await.unwrap();
        db.close().await;

        let db = Db::load(&path).await.unwrap();
        let version = migrations::current_version(db.pool()).await.unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_init_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.sqlite");
        std::fs::write(&path, b"").unwrap();
        let err = Db::init(&path).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Db::load(dir.path().join("nope.sqlite")).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_load_refuses_newer_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.sqlite");
        let db = Db::init(&path).await.unwrap();
        sqlx::query("UPDATE schema_version SET version = 99")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let err = Db::load(&path).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
