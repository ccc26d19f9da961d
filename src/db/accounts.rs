use super::guard::ensure_account_unused;
use super::transactions::insert_postings;
use super::Db;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{
    account_name, non_empty, Account, AccountBalance, AccountId, AccountKind, AccountUpdates,
    Amount, NewAccount, Posting,
};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, FromRow)]
struct AccountRow {
    id: AccountId,
    name: String,
    color: Option<String>,
    kind: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = Error;

    fn try_from(row: AccountRow) -> Result<Self> {
        let kind = AccountKind::from_str(&row.kind)
            .with_context(|| format!("Account {} has an unknown kind '{}'", row.id, row.kind))
            .pub_result(ErrorType::Storage)?;
        Ok(Account {
            id: row.id,
            name: row.name,
            color: row.color,
            kind,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BalanceRow {
    #[sqlx(flatten)]
    account: AccountRow,
    balance: i64,
}

impl Db {
    /// Creates an account. A non-zero opening balance is written as one transaction dated today in
    /// the same unit of work.
    pub async fn create_account(&self, account: NewAccount) -> Result<Account> {
        let account = account.normalized()?;
        let opening = account.opening_balance.filter(|amount| !amount.is_zero());

        let mut uow = self.unit_of_work().await?;
        let id: AccountId = sqlx::query_scalar(
            "INSERT INTO accounts (name, color, kind, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&account.name)
        .bind(&account.color)
        .bind(account.kind.to_string())
        .bind(Utc::now())
        .fetch_one(uow.conn())
        .await
        .with_context(|| format!("Unable to insert account '{}'", account.name))?;

        if let Some(amount) = opening {
            let posting = Posting::opening(id, Local::now().date_naive(), amount)?;
            insert_postings(uow.conn(), &[posting]).await?;
        }

        let created = get(uow.conn(), id).await?;
        uow.commit().await?;
        info!(
            "Created {} account {} '{}'",
            created.kind, created.id, created.name
        );
        Ok(created)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .context("Unable to acquire a connection")
            .pub_result(ErrorType::Storage)?;
        get(&mut conn, id).await
    }

    /// Every account with its computed balance, ordered by name.
    pub async fn list_accounts(&self) -> Result<Vec<AccountBalance>> {
        let rows: Vec<BalanceRow> = sqlx::query_as(
            "SELECT a.id, a.name, a.color, a.kind, a.created_at, \
                COALESCE(SUM(t.amount), 0) AS balance \
            FROM accounts a LEFT JOIN transactions t ON t.account_id = a.id \
            GROUP BY a.id \
            ORDER BY a.name COLLATE NOCASE, a.id",
        )
        .fetch_all(self.pool())
        .await
        .context("Unable to list accounts")?;

        rows.into_iter()
            .map(|row| {
                let balance = Amount::from_cents(row.balance);
                Ok(AccountBalance::new(Account::try_from(row.account)?, balance))
            })
            .collect()
    }

    /// The signed sum of every transaction on the account.
    pub async fn balance(&self, id: AccountId) -> Result<Amount> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .context("Unable to acquire a connection")
            .pub_result(ErrorType::Storage)?;
        get(&mut conn, id).await?;
        sum(&mut conn, id).await
    }

    /// The account together with its balance, read from one snapshot.
    pub async fn account_balance(&self, id: AccountId) -> Result<AccountBalance> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("Unable to begin a read transaction")
            .pub_result(ErrorType::Storage)?;
        let account = get(&mut tx, id).await?;
        let balance = sum(&mut tx, id).await?;
        Ok(AccountBalance::new(account, balance))
    }

    /// Changes the name and/or color. An empty color clears it.
    pub async fn update_account(&self, id: AccountId, updates: AccountUpdates) -> Result<Account> {
        let name = updates.name.as_deref().map(account_name).transpose()?;
        let color = updates.color.map(|c| non_empty(Some(c)));

        let mut uow = self.unit_of_work().await?;
        let current = get(uow.conn(), id).await?;
        if name.is_none() && color.is_none() {
            return Ok(current);
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE accounts SET ");
        let mut set = query.separated(", ");
        if let Some(name) = name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(color) = color {
            set.push("color = ").push_bind_unseparated(color);
        }
        query.push(" WHERE id = ").push_bind(id);
        query
            .build()
            .execute(uow.conn())
            .await
            .with_context(|| format!("Unable to update account {id}"))?;

        let updated = get(uow.conn(), id).await?;
        uow.commit().await?;
        info!("Updated account {id}");
        Ok(updated)
    }

    /// Deletes an account. Fails with `AccountInUse` while any transaction references it.
    pub async fn delete_account(&self, id: AccountId) -> Result<Account> {
        let mut uow = self.unit_of_work().await?;
        let account = get(uow.conn(), id).await?;
        ensure_account_unused(uow.conn(), id).await?;
        sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(uow.conn())
            .await
            .with_context(|| format!("Unable to delete account {id}"))?;
        uow.commit().await?;
        info!("Deleted account {id} '{}'", account.name);
        Ok(account)
    }
}

pub(crate) async fn get(conn: &mut SqliteConnection, id: AccountId) -> Result<Account> {
    let row: Option<AccountRow> =
        sqlx::query_as("SELECT id, name, color, kind, created_at FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .with_context(|| format!("Unable to read account {id}"))?;
    match row {
        Some(row) => Account::try_from(row),
        None => Err(Error::not_found(format!("Account {id} does not exist"))),
    }
}

async fn sum(conn: &mut SqliteConnection, id: AccountId) -> Result<Amount> {
    let cents: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE account_id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("Unable to sum the transactions of account {id}"))?;
    Ok(Amount::from_cents(cents))
}
