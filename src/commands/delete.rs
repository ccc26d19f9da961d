//! Delete command handlers.

use crate::commands::Out;
use crate::model::{Account, AccountId, Category, CategoryId, Transaction, TransactionId};
use crate::{Config, Result};

/// Deletes an account.
///
/// # Errors
///
/// - Returns an `AccountInUse` error if any transaction references the account. Nothing is
///   deleted in that case.
pub async fn delete_account(config: Config, id: AccountId) -> Result<Out<Account>> {
    let deleted = config.db().delete_account(id).await?;
    let message = format!("Deleted account {} '{}'", deleted.id(), deleted.name());
    Ok(Out::new(message, deleted))
}

/// Deletes a category.
///
/// # Errors
///
/// - Returns a `CategoryInUse` error if any transaction references the category. Reassign or
///   clear the category on those transactions first.
pub async fn delete_category(config: Config, id: CategoryId) -> Result<Out<Category>> {
    let deleted = config.db().delete_category(id).await?;
    let message = format!("Deleted category {} '{}'", deleted.id(), deleted.name());
    Ok(Out::new(message, deleted))
}

/// Deletes a transaction.
pub async fn delete_transaction(config: Config, id: TransactionId) -> Result<Out<Transaction>> {
    let deleted = config.db().delete_transaction(id).await?;
    let message = format!("Deleted transaction {}", deleted.id());
    Ok(Out::new(message, deleted))
}
