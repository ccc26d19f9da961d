//! Write serialization and the referential rules checked inside every write.

use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{AccountId, CategoryId};
use crate::Result;
use anyhow::Context;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One all-or-nothing write.
///
/// Holds the writer lock and an open database transaction. Dropping a `UnitOfWork` without
/// calling [`UnitOfWork::commit`] rolls the transaction back.
pub(crate) struct UnitOfWork {
    // Declared before the lock so the transaction is released first on drop.
    tx: Transaction<'static, Sqlite>,
    _writer: OwnedMutexGuard<()>,
}

impl UnitOfWork {
    pub(crate) async fn begin(pool: &SqlitePool, writer: Arc<Mutex<()>>) -> Result<Self> {
        let guard = writer.lock_owned().await;
        let tx = pool
            .begin()
            .await
            .context("Unable to begin a write transaction")
            .pub_result(ErrorType::Storage)?;
        Ok(Self {
            tx,
            _writer: guard,
        })
    }

    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub(crate) async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .context("Unable to commit the write transaction")
            .pub_result(ErrorType::Storage)
    }
}

/// Fails with `AccountInUse` if any transaction references `id`.
pub(crate) async fn ensure_account_unused(
    conn: &mut SqliteConnection,
    id: AccountId,
) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE account_id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .context("Unable to count the account's transactions")
        .pub_result(ErrorType::Storage)?;
    if count > 0 {
        return Err(Error::new(
            ErrorType::AccountInUse,
            format!("Account {id} is referenced by {count} transaction(s) and cannot be deleted"),
        ));
    }
    Ok(())
}

/// Fails with `CategoryInUse` if any transaction references `id`.
pub(crate) async fn ensure_category_unused(
    conn: &mut SqliteConnection,
    id: CategoryId,
    name: &str,
) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE category_id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .context("Unable to count the category's transactions")
        .pub_result(ErrorType::Storage)?;
    if count > 0 {
        return Err(Error::new(
            ErrorType::CategoryInUse,
            format!(
                "Category '{name}' is referenced by {count} transaction(s) and cannot be deleted"
            ),
        ));
    }
    Ok(())
}

/// Fails with `Conflict` if a category other than `except` already uses `name`, compared
/// without case.
pub(crate) async fn ensure_category_name_free(
    conn: &mut SqliteConnection,
    name: &str,
    except: Option<CategoryId>,
) -> Result<()> {
    let existing = super::categories::find_by_name(conn, name).await?;
    match existing {
        Some(category) if Some(category.id()) != except => Err(Error::new(
            ErrorType::Conflict,
            format!(
                "Category '{name}' conflicts with the existing category '{}'",
                category.name()
            ),
        )),
        _ => Ok(()),
    }
}
