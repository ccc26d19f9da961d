//! Update command handlers.

use crate::args::{UpdateAccountArgs, UpdateCategoryArgs, UpdateTransactionArgs};
use crate::commands::Out;
use crate::model::{Account, AccountUpdates, Category, Transaction, TransactionUpdates};
use crate::{Config, Result};

/// Renames an account and/or changes its color. Fields that are not passed are left alone.
pub async fn update_account(config: Config, args: UpdateAccountArgs) -> Result<Out<Account>> {
    let updates = AccountUpdates {
        name: args.name,
        color: args.color,
    };
    let updated = config.db().update_account(args.id, updates).await?;
    let message = format!("Updated account {}", updated.id());
    Ok(Out::new(message, updated))
}

/// Renames a category.
///
/// # Errors
///
/// - Returns a `Conflict` error if another category already has the name, ignoring case.
pub async fn update_category(config: Config, args: UpdateCategoryArgs) -> Result<Out<Category>> {
    let updated = config.db().rename_category(args.id, &args.name).await?;
    let message = format!("Renamed category {} to '{}'", updated.id(), updated.name());
    Ok(Out::new(message, updated))
}

/// Changes the given fields of a transaction. Fields that are not passed are left alone.
pub async fn update_transaction(
    config: Config,
    args: UpdateTransactionArgs,
) -> Result<Out<Transaction>> {
    let updates = TransactionUpdates {
        date: args.date,
        amount: args.amount,
        account_id: args.account,
        description: args.description,
        category: args.category,
    };
    let updated = config.db().update_transaction(args.id, updates).await?;
    let message = format!("Updated transaction {}", updated.id());
    Ok(Out::new(message, updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountKind, Movement};
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_update_transaction_moves_account() {
        let env = TestEnv::new().await;
        let a = env.account("A", AccountKind::Standard).await;
        let b = env.account("B", AccountKind::Standard).await;
        let row = env
            .db()
            .record(Movement::income(a, env.date(), env.amount("10")))
            .await
            .unwrap()
            .remove(0);

        let out = update_transaction(
            env.config(),
            UpdateTransactionArgs {
                id: row.id(),
                date: Some(env.day(1)),
                amount: None,
                account: Some(b),
                description: None,
                category: None,
            },
        )
        .await
        .unwrap();
        let updated = out.structure().unwrap();
        assert_eq!(updated.account_id(), b);
        assert_eq!(updated.date(), env.day(1));
        assert_eq!(env.balance(a).await, "0.00");
        assert_eq!(env.balance(b).await, "10.00");
    }

    #[tokio::test]
    async fn test_update_account_and_category() {
        let env = TestEnv::new().await;
        let a = env.account("Old", AccountKind::Standard).await;
        let out = update_account(
            env.config(),
            UpdateAccountArgs {
                id: a,
                name: Some("New".to_string()),
                color: Some("red".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(out.structure().unwrap().name(), "New");
        assert_eq!(out.structure().unwrap().color(), Some("red"));

        let food = env.db().create_category("food").await.unwrap();
        let out = update_category(
            env.config(),
            UpdateCategoryArgs {
                id: food.id(),
                name: "Food".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(out.message(), format!("Renamed category {} to 'Food'", food.id()));
    }
}
