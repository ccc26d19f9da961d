//! Insert command handlers.

use crate::args::{InsertAccountArgs, InsertCategoryArgs, InsertTransactionArgs, InsertTransferArgs};
use crate::commands::{plural, Out};
use crate::model::{Account, Category, Movement, NewAccount, Transaction, Transfer};
use crate::{Config, Result};
use chrono::Local;

/// Creates an account. When `--opening-balance` is given and non-zero, an opening transaction
/// dated today is written together with the account.
///
/// # Errors
///
/// - Returns a `Validation` error if the name is empty or the opening balance has more than two
///   decimal places.
pub async fn insert_account(config: Config, args: InsertAccountArgs) -> Result<Out<Account>> {
    let mut account = NewAccount::new(args.name, args.kind);
    account.color = args.color;
    account.opening_balance = args.opening_balance;

    let created = config.db().create_account(account).await?;
    let message = format!(
        "Inserted {} account '{}' with ID: {}",
        created.kind(),
        created.name(),
        created.id()
    );
    Ok(Out::new(message, created))
}

/// Creates a category.
///
/// # Errors
///
/// - Returns a `Conflict` error if a category with the same name, ignoring case, exists.
pub async fn insert_category(config: Config, args: InsertCategoryArgs) -> Result<Out<Category>> {
    let created = config.db().create_category(&args.name).await?;
    let message = format!(
        "Inserted category '{}' with ID: {}",
        created.name(),
        created.id()
    );
    Ok(Out::new(message, created))
}

/// Records an income or expense. With `--mirror-to`, a copy is written on the reimbursable
/// account in the same write.
///
/// # Errors
///
/// - Returns a `NotFound` error if either account does not exist.
/// - Returns a `Validation` error if the mirror accounts have the wrong classification.
pub async fn insert_transaction(
    config: Config,
    args: InsertTransactionArgs,
) -> Result<Out<Vec<Transaction>>> {
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let movement = Movement {
        account_id: args.account,
        date,
        amount: args.amount,
        direction: args.direction,
        description: args.description,
        category: args.category,
        mirror_to: args.mirror_to,
    };
    let written = config.db().record(movement).await?;
    let ids: Vec<String> = written.iter().map(|t| t.id().to_string()).collect();
    let message = format!(
        "Inserted {} with ID: {}",
        plural(written.len(), "transaction", "transactions"),
        ids.join(", ")
    );
    Ok(Out::new(message, written))
}

/// Moves money between two accounts, writing the debit and the credit together.
///
/// # Errors
///
/// - Returns a `Validation` error if both accounts are the same or the amount is zero.
pub async fn insert_transfer(
    config: Config,
    args: InsertTransferArgs,
) -> Result<Out<Vec<Transaction>>> {
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let mut transfer = Transfer::new(args.from, args.to, date, args.amount);
    transfer.note = args.note;

    let written = config.db().transfer(transfer).await?;
    let message = format!(
        "Transferred {} from account {} to account {}",
        args.amount.abs(),
        args.from,
        args.to
    );
    Ok(Out::new(message, written))
}
