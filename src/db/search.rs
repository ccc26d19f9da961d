//! Filtered, sorted and paginated reads over the ledger.

use super::Db;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{
    AccountId, AccountKind, Amount, CategoryId, ClassificationSums, SearchFilter, SearchResult,
    SortDirection, SortKey, TransactionId, TransactionView, TxType,
};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::str::FromStr;
use tracing::debug;

const COLUMNS: &str = "SELECT t.id, t.account_id, a.name AS account_name, \
    a.color AS account_color, a.kind AS account_kind, t.date, t.category_id, c.name AS category, \
    t.description, t.amount, t.created_at";

const FROM: &str = " FROM transactions t \
    JOIN accounts a ON a.id = t.account_id \
    LEFT JOIN categories c ON c.id = t.category_id";

const SUMS: &str = "SELECT \
    COALESCE(SUM(CASE WHEN t.amount > 0 THEN t.amount END), 0) AS income, \
    COALESCE(SUM(CASE WHEN t.amount < 0 THEN t.amount END), 0) AS expense, \
    COALESCE(SUM(CASE WHEN t.amount > 0 AND a.kind = 'standard' \
        THEN t.amount END), 0) AS income_standard, \
    COALESCE(SUM(CASE WHEN t.amount > 0 AND a.kind = 'reimbursable' \
        THEN t.amount END), 0) AS income_reimbursable, \
    COALESCE(SUM(CASE WHEN t.amount < 0 AND a.kind = 'standard' \
        THEN t.amount END), 0) AS expense_standard, \
    COALESCE(SUM(CASE WHEN t.amount < 0 AND a.kind = 'reimbursable' \
        THEN t.amount END), 0) AS expense_reimbursable";

#[derive(Debug, FromRow)]
struct ViewRow {
    id: TransactionId,
    account_id: AccountId,
    account_name: String,
    account_color: Option<String>,
    account_kind: String,
    date: NaiveDate,
    category_id: Option<CategoryId>,
    category: Option<String>,
    description: Option<String>,
    amount: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ViewRow> for TransactionView {
    type Error = Error;

    fn try_from(row: ViewRow) -> Result<Self> {
        let account_kind = AccountKind::from_str(&row.account_kind)
            .with_context(|| format!("Account {} has an unknown kind", row.account_id))
            .pub_result(ErrorType::Storage)?;
        Ok(TransactionView {
            id: row.id,
            account_id: row.account_id,
            account_name: row.account_name,
            account_color: row.account_color,
            account_kind,
            date: row.date,
            category_id: row.category_id,
            category: row.category,
            description: row.description,
            amount: Amount::from_cents(row.amount),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SumsRow {
    income: i64,
    expense: i64,
    income_standard: i64,
    income_reimbursable: i64,
    expense_standard: i64,
    expense_reimbursable: i64,
}

impl Db {
    /// Runs a search and returns one page plus totals over the whole filtered set.
    ///
    /// The count, the page and the sums are read inside one read transaction, so they always
    /// describe the same state of the ledger.
    pub async fn search(&self, filter: SearchFilter) -> Result<SearchResult> {
        let settings = self.settings();
        let page_size = filter.page_size(settings.page_size)?;

        let mut tx = self
            .pool()
            .begin()
            .await
            .context("Unable to begin a read transaction")
            .pub_result(ErrorType::Storage)?;

        let total = count(&mut tx, &filter).await?;
        let offset = filter.effective_offset(total, page_size, settings.last_page)?;
        let items = select(&mut tx, &filter, Some((page_size, offset))).await?;
        let totals = sums(&mut tx, &filter).await?;
        debug!(
            "Search matched {total} row(s), returning {} from offset {offset}",
            items.len()
        );

        Ok(SearchResult {
            items,
            total,
            effective_offset: offset,
            sum_income: Amount::from_cents(totals.income),
            sum_expense: Amount::from_cents(totals.expense),
            income_by_classification: ClassificationSums {
                standard: Amount::from_cents(totals.income_standard),
                reimbursable: Amount::from_cents(totals.income_reimbursable),
            },
            expense_by_classification: ClassificationSums {
                standard: Amount::from_cents(totals.expense_standard),
                reimbursable: Amount::from_cents(totals.expense_reimbursable),
            },
        })
    }

    /// Every row matching the filter in the requested order, ignoring `limit` and `offset`.
    pub async fn export(&self, filter: SearchFilter) -> Result<Vec<TransactionView>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .context("Unable to acquire a connection")
            .pub_result(ErrorType::Storage)?;
        select(&mut conn, &filter, None).await
    }
}

async fn count(conn: &mut SqliteConnection, filter: &SearchFilter) -> Result<u64> {
    let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
    query.push(FROM);
    push_filters(&mut query, filter, true);
    let total: i64 = query
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await
        .context("Unable to count matching transactions")?;
    Ok(u64::try_from(total).unwrap_or_default())
}

async fn select(
    conn: &mut SqliteConnection,
    filter: &SearchFilter,
    page: Option<(u32, u64)>,
) -> Result<Vec<TransactionView>> {
    let mut query = QueryBuilder::<Sqlite>::new(COLUMNS);
    query.push(FROM);
    push_filters(&mut query, filter, true);
    push_order(&mut query, filter.sort, filter.direction);
    if let Some((limit, offset)) = page {
        let offset = i64::try_from(offset)
            .context("Offset is out of range")
            .pub_result(ErrorType::Validation)?;
        query
            .push(" LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(offset);
    }
    let rows: Vec<ViewRow> = query
        .build_query_as()
        .fetch_all(&mut *conn)
        .await
        .context("Unable to read matching transactions")?;
    rows.into_iter().map(TransactionView::try_from).collect()
}

/// Income and expense totals over the filter with the type restriction lifted.
async fn sums(conn: &mut SqliteConnection, filter: &SearchFilter) -> Result<SumsRow> {
    let mut query = QueryBuilder::<Sqlite>::new(SUMS);
    query.push(FROM);
    push_filters(&mut query, filter, false);
    let row: SumsRow = query
        .build_query_as()
        .fetch_one(&mut *conn)
        .await
        .context("Unable to sum matching transactions")?;
    Ok(row)
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &SearchFilter, with_type: bool) {
    query.push(" WHERE 1=1");

    if let Some(needle) = filter.needle() {
        let pattern = format!("%{}%", escape_like(&needle));
        query
            .push(" AND (LOWER(COALESCE(t.description, '')) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(COALESCE(c.name, '')) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(a.name) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(account_id) = filter.account_id {
        query.push(" AND t.account_id = ").push_bind(account_id);
    }
    if let Some(from) = filter.date_from {
        query.push(" AND t.date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        query.push(" AND t.date <= ").push_bind(to);
    }
    if with_type {
        match filter.tx_type {
            TxType::All => {}
            TxType::Income => {
                query.push(" AND t.amount > 0");
            }
            TxType::Expense => {
                query.push(" AND t.amount < 0");
            }
        }
    }
}

fn push_order(query: &mut QueryBuilder<'_, Sqlite>, sort: SortKey, direction: SortDirection) {
    let dir = match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    let key = match sort {
        SortKey::Date => "t.date",
        SortKey::Category => "c.name COLLATE NOCASE",
        SortKey::Description => "t.description COLLATE NOCASE",
        SortKey::Amount => "t.amount",
        SortKey::Account => "a.name COLLATE NOCASE",
        SortKey::Id => {
            query.push(format!(" ORDER BY t.id {dir}"));
            return;
        }
    };
    query.push(format!(" ORDER BY {key} {dir}, t.id ASC"));
}

/// Escapes the `LIKE` wildcards so that user text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
