//! Ledger writes. Every intent runs inside one [`UnitOfWork`](super::UnitOfWork): either all of
//! its rows are committed or none are.

use super::{accounts, categories, Db};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{
    cents, clean, AccountId, Amount, CategoryId, Movement, Posting, Transaction, TransactionId,
    TransactionUpdates, Transfer,
};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: TransactionId,
    account_id: AccountId,
    date: NaiveDate,
    description: Option<String>,
    amount: i64,
    category_id: Option<CategoryId>,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: row.id,
            account_id: row.account_id,
            date: row.date,
            description: row.description,
            amount: Amount::from_cents(row.amount),
            category_id: row.category_id,
            created_at: row.created_at,
        }
    }
}

impl Db {
    /// Records an income or expense. With `mirror_to` set, an identical row is written on the
    /// reimbursable account as part of the same write.
    pub async fn record(&self, movement: Movement) -> Result<Vec<Transaction>> {
        let mut uow = self.unit_of_work().await?;
        let primary = accounts::get(uow.conn(), movement.account_id).await?;
        let mirror = match movement.mirror_to {
            Some(id) => Some(accounts::get(uow.conn(), id).await?),
            None => None,
        };

        let mut postings = movement.postings(&primary, mirror.as_ref(), None)?;
        let category_id = categories::resolve(uow.conn(), movement.category.as_deref()).await?;
        for posting in &mut postings {
            posting.category_id = category_id;
        }

        let written = insert_postings(uow.conn(), &postings).await?;
        uow.commit().await?;
        info!(
            "Recorded {} of {} on account {}{}",
            movement.direction,
            movement.amount.abs(),
            primary.name(),
            mirror
                .map(|m| format!(" mirrored to {}", m.name()))
                .unwrap_or_default()
        );
        Ok(written)
    }

    /// Moves money between two accounts: a debit on `from` and a credit on `to`.
    pub async fn transfer(&self, transfer: Transfer) -> Result<Vec<Transaction>> {
        let mut uow = self.unit_of_work().await?;
        let from = accounts::get(uow.conn(), transfer.from).await?;
        let to = accounts::get(uow.conn(), transfer.to).await?;
        let postings = transfer.postings(&from, &to)?;
        let written = insert_postings(uow.conn(), &postings).await?;
        uow.commit().await?;
        info!(
            "Transferred {} from {} to {}",
            transfer.amount.abs(),
            from.name(),
            to.name()
        );
        Ok(written)
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .context("Unable to acquire a connection")
            .pub_result(ErrorType::Storage)?;
        get(&mut conn, id).await
    }

    /// Applies a partial update. Fields that are `None` keep their value; an empty description or
    /// category clears it.
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        updates: TransactionUpdates,
    ) -> Result<Transaction> {
        let amount = updates.amount.map(cents).transpose()?;

        let mut uow = self.unit_of_work().await?;
        let current = get(uow.conn(), id).await?;
        if updates.is_empty() {
            return Ok(current);
        }
        if let Some(account_id) = updates.account_id {
            accounts::get(uow.conn(), account_id).await?;
        }
        let category_id = match updates.category.as_deref() {
            Some(text) => Some(categories::resolve(uow.conn(), Some(text)).await?),
            None => None,
        };

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE transactions SET ");
        let mut set = query.separated(", ");
        if let Some(date) = updates.date {
            set.push("date = ").push_bind_unseparated(date);
        }
        if let Some(amount) = amount {
            set.push("amount = ").push_bind_unseparated(amount);
        }
        if let Some(account_id) = updates.account_id {
            set.push("account_id = ").push_bind_unseparated(account_id);
        }
        if let Some(description) = updates.description.as_deref() {
            set.push("description = ")
                .push_bind_unseparated(clean(Some(description)));
        }
        if let Some(category_id) = category_id {
            set.push("category_id = ").push_bind_unseparated(category_id);
        }
        query.push(" WHERE id = ").push_bind(id);
        query
            .build()
            .execute(uow.conn())
            .await
            .with_context(|| format!("Unable to update transaction {id}"))?;

        let updated = get(uow.conn(), id).await?;
        uow.commit().await?;
        info!("Updated transaction {id}");
        Ok(updated)
    }

    /// Deletes one transaction. Transactions are leaves, so nothing else is checked.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<Transaction> {
        let mut uow = self.unit_of_work().await?;
        let transaction = get(uow.conn(), id).await?;
        sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(uow.conn())
            .await
            .with_context(|| format!("Unable to delete transaction {id}"))?;
        uow.commit().await?;
        info!("Deleted transaction {id}");
        Ok(transaction)
    }
}

/// Writes planned rows in order and returns them as stored.
pub(crate) async fn insert_postings(
    conn: &mut SqliteConnection,
    postings: &[Posting],
) -> Result<Vec<Transaction>> {
    let mut written = Vec::with_capacity(postings.len());
    for posting in postings {
        let row: TransactionRow = sqlx::query_as(
            "INSERT INTO transactions \
                (account_id, date, description, amount, category_id, created_at) \
            VALUES (?, ?, ?, ?, ?, ?) \
            RETURNING id, account_id, date, description, amount, category_id, created_at",
        )
        .bind(posting.account_id)
        .bind(posting.date)
        .bind(&posting.description)
        .bind(posting.cents)
        .bind(posting.category_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .with_context(|| {
            format!(
                "Unable to write a transaction of {} on account {}",
                posting.amount(),
                posting.account_id
            )
        })?;
        debug!("Wrote transaction {} on account {}", row.id, row.account_id);
        written.push(Transaction::from(row));
    }
    Ok(written)
}

pub(crate) async fn get(conn: &mut SqliteConnection, id: TransactionId) -> Result<Transaction> {
    let row: Option<TransactionRow> = sqlx::query_as(
        "SELECT id, account_id, date, description, amount, category_id, created_at \
        FROM transactions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("Unable to read transaction {id}"))?;
    row.map(Transaction::from)
        .ok_or_else(|| Error::not_found(format!("Transaction {id} does not exist")))
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorType;
    use crate::model::{
        AccountKind, Movement, NewAccount, SearchFilter, TransactionId, TransactionUpdates,
        Transfer,
    };
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_ledger_scenario() {
        let env = TestEnv::new().await;
        let db = env.db();

        let checking = db
            .create_account(
                NewAccount::new("Checking", AccountKind::Standard)
                    .opening_balance(env.amount("1000.00")),
            )
            .await
            .unwrap();
        assert_eq!(env.balance(checking.id()).await, "1,000.00");

        let lunch = db
            .record(
                Movement::expense(checking.id(), env.date(), env.amount("42.50")).category("Food"),
            )
            .await
            .unwrap();
        assert_eq!(env.balance(checking.id()).await, "957.50");

        let savings = db
            .create_account(NewAccount::new("Savings", AccountKind::Standard))
            .await
            .unwrap();
        db.transfer(Transfer::new(
            checking.id(),
            savings.id(),
            env.date(),
            env.amount("100.00"),
        ))
        .await
        .unwrap();
        assert_eq!(env.balance(checking.id()).await, "857.50");
        assert_eq!(env.balance(savings.id()).await, "100.00");

        let err = db.delete_account(checking.id()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::AccountInUse);

        let food = lunch[0].category_id().unwrap();
        let err = db.delete_category(food).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::CategoryInUse);

        db.update_transaction(
            lunch[0].id(),
            TransactionUpdates {
                category: Some("Restaurants".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        db.delete_category(food).await.unwrap();
        assert_eq!(env.balance(checking.id()).await, "857.50");
    }

    #[tokio::test]
    async fn test_movement_sign_follows_direction() {
        let env = TestEnv::new().await;
        let account = env.account("Checking", AccountKind::Standard).await;
        let db = env.db();

        let income = db
            .record(Movement::income(account, env.date(), env.amount("-20")))
            .await
            .unwrap();
        assert_eq!(income[0].amount().to_cents(), Some(2000));

        let expense = db
            .record(Movement::expense(account, env.date(), env.amount("20")))
            .await
            .unwrap();
        assert_eq!(expense[0].amount().to_cents(), Some(-2000));
        assert_eq!(env.balance(account).await, "0.00");
    }

    #[tokio::test]
    async fn test_category_canonicalized_on_write() {
        let env = TestEnv::new().await;
        let account = env.account("Checking", AccountKind::Standard).await;
        let db = env.db();
        let food = db.create_category("Food").await.unwrap();

        let rows = db
            .record(Movement::expense(account, env.date(), env.amount("1")).category("  fOOd "))
            .await
            .unwrap();
        assert_eq!(rows[0].category_id(), Some(food.id()));

        let rows = db
            .record(Movement::expense(account, env.date(), env.amount("1")).category(" "))
            .await
            .unwrap();
        assert_eq!(rows[0].category_id(), None);
        assert_eq!(db.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_conserves_total() {
        let env = TestEnv::new().await;
        let db = env.db();
        let a = db
            .create_account(
                NewAccount::new("A", AccountKind::Standard).opening_balance(env.amount("250.00")),
            )
            .await
            .unwrap();
        let b = db
            .create_account(
                NewAccount::new("B", AccountKind::Reimbursable)
                    .opening_balance(env.amount("-12.34")),
            )
            .await
            .unwrap();
        let before = db.balance(a.id()).await.unwrap().to_cents().unwrap()
            + db.balance(b.id()).await.unwrap().to_cents().unwrap();

        let rows = db
            .transfer(
                Transfer::new(a.id(), b.id(), env.date(), env.amount("77.70")).note("Reimburse"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account_id(), a.id());
        assert_eq!(rows[0].amount().to_cents(), Some(-7770));
        assert_eq!(rows[1].account_id(), b.id());
        assert_eq!(rows[1].amount().to_cents(), Some(7770));
        assert_eq!(rows[0].date(), rows[1].date());
        assert_eq!(
            rows[0].description(),
            Some("Reimburse (Transfer from A to B)")
        );
        assert!(rows[0].id() < rows[1].id());

        let after = db.balance(a.id()).await.unwrap().to_cents().unwrap()
            + db.balance(b.id()).await.unwrap().to_cents().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_transfer_validation_writes_nothing() {
        let env = TestEnv::new().await;
        let a = env.account("A", AccountKind::Standard).await;
        let b = env.account("B", AccountKind::Standard).await;
        let db = env.db();

        let err = db
            .transfer(Transfer::new(a, a, env.date(), env.amount("1")))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);

        let err = db
            .transfer(Transfer::new(a, b, env.date(), env.amount("0")))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);

        let err = db
            .transfer(Transfer::new(
                a,
                crate::model::AccountId::new(99),
                env.date(),
                env.amount("1"),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);

        assert_eq!(db.search(SearchFilter::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_failed_second_row_rolls_back_transfer() {
        let env = TestEnv::new().await;
        let a = env.account("A", AccountKind::Standard).await;
        let b = env.account("B", AccountKind::Standard).await;
        let db = env.db();
        sqlx::query(
            "CREATE TRIGGER fail_credit BEFORE INSERT ON transactions WHEN NEW.amount > 0 \
            BEGIN SELECT RAISE(ABORT, 'credit rejected'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db
            .transfer(Transfer::new(a, b, env.date(), env.amount("10")))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Storage);
        assert!(err.to_string().contains("credit rejected"));

        assert_eq!(db.search(SearchFilter::default()).await.unwrap().total, 0);
        assert_eq!(env.balance(a).await, "0.00");
        assert_eq!(env.balance(b).await, "0.00");
    }

    #[tokio::test]
    async fn test_mirror_writes_identical_row() {
        let env = TestEnv::new().await;
        let checking = env.account("Checking", AccountKind::Standard).await;
        let work = env.account("Work", AccountKind::Reimbursable).await;
        let db = env.db();

        let rows = db
            .record(
                Movement::expense(checking, env.date(), env.amount("120.00"))
                    .description("Client dinner")
                    .category("Meals")
                    .mirror_to(work),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].account_id(), work);
        assert_eq!(rows[0].amount(), rows[1].amount());
        assert_eq!(rows[0].date(), rows[1].date());
        assert_eq!(rows[0].description(), Some("Client dinner"));
        assert_eq!(rows[0].description(), rows[1].description());
        assert_eq!(rows[0].category_id(), rows[1].category_id());

        assert_eq!(env.balance(checking).await, "-120.00");
        assert_eq!(env.balance(work).await, "-120.00");
        let work_row = db
            .list_accounts()
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.account.id() == work)
            .unwrap();
        assert_eq!(work_row.reported.to_cents(), Some(12000));
    }

    #[tokio::test]
    async fn test_mirror_to_standard_account_rejected() {
        let env = TestEnv::new().await;
        let checking = env.account("Checking", AccountKind::Standard).await;
        let savings = env.account("Savings", AccountKind::Standard).await;
        let db = env.db();

        let err = db
            .record(
                Movement::expense(checking, env.date(), env.amount("5"))
                    .category("Brand new")
                    .mirror_to(savings),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(db.list_categories().await.unwrap().is_empty());
        assert_eq!(db.search(SearchFilter::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let env = TestEnv::new().await;
        let checking = env.account("Checking", AccountKind::Standard).await;
        let savings = env.account("Savings", AccountKind::Standard).await;
        let db = env.db();
        let original = db
            .record(
                Movement::expense(checking, env.date(), env.amount("9.99"))
                    .description("Coffee beans")
                    .category("Groceries"),
            )
            .await
            .unwrap()
            .remove(0);

        let updated = db
            .update_transaction(
                original.id(),
                TransactionUpdates {
                    amount: Some(env.amount("-11.49")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.amount().to_cents(), Some(-1149));
        assert_eq!(updated.description(), Some("Coffee beans"));
        assert_eq!(updated.category_id(), original.category_id());
        assert_eq!(updated.date(), original.date());

        let moved = db
            .update_transaction(
                original.id(),
                TransactionUpdates {
                    account_id: Some(savings),
                    description: Some(String::new()),
                    category: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.account_id(), savings);
        assert_eq!(moved.description(), None);
        assert_eq!(moved.category_id(), None);
        assert_eq!(moved.amount().to_cents(), Some(-1149));
        assert_eq!(env.balance(checking).await, "0.00");
        assert_eq!(env.balance(savings).await, "-11.49");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let env = TestEnv::new().await;
        let db = env.db();
        let missing = TransactionId::new(12);
        let err = db
            .update_transaction(
                missing,
                TransactionUpdates {
                    description: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
        let err = db.delete_transaction(missing).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_update_rejects_sub_cent_amount() {
        let env = TestEnv::new().await;
        let checking = env.account("Checking", AccountKind::Standard).await;
        let db = env.db();
        let row = db
            .record(Movement::income(checking, env.date(), env.amount("1")))
            .await
            .unwrap()
            .remove(0);
        let err = db
            .update_transaction(
                row.id(),
                TransactionUpdates {
                    amount: Some(env.amount("0.001")),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
    }
}
