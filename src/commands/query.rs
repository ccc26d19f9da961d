//! Read-only commands: transaction search, balances and listings.
//!
//! This module provides:
//! - `query`: filtered, sorted and paginated transaction search, as JSON or CSV
//! - `balance`: the derived balance of one account
//! - `list_accounts` and `list_categories`

use crate::args::{OutputFormat, QueryArgs};
use crate::commands::{plural, Out};
use crate::model::{
    AccountBalance, AccountId, AmountFormat, Category, DecimalSeparator, SearchFilter,
    TransactionView,
};
use crate::Config;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Amounts in CSV output are plain numbers, e.g. `-60000.00`.
const CSV_AMOUNT: AmountFormat = AmountFormat::new(DecimalSeparator::Period, false);

const CSV_HEADERS: [&str; 7] = [
    "id",
    "date",
    "account",
    "kind",
    "category",
    "description",
    "amount",
];

/// Query results in the requested output format.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rows {
    /// The serialized search result, or the full row list when `--all` is given.
    Json(serde_json::Value),
    /// CSV data as a properly escaped string, one line per transaction.
    Csv(String),
}

impl Debug for Rows {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rows::Json(v) => write!(f, "Rows::Json({:?})", v),
            Rows::Csv(s) => write!(f, "Rows::Csv({} chars)", s.len()),
        }
    }
}

impl Display for Rows {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rows::Json(v) => {
                if let Ok(s) = serde_json::to_string_pretty(v) {
                    write!(f, "{}", s)
                } else {
                    write!(f, "{:?}", v)
                }
            }
            Rows::Csv(s) => write!(f, "{}", s),
        }
    }
}

/// Searches transactions.
///
/// Without `--all` one page is returned together with the total count and the income and expense
/// sums over the whole filtered set. With `--all` every matching row is returned and the paging
/// arguments are ignored.
///
/// # Errors
///
/// - Returns a `Validation` error for a zero `--limit` or a negative `--offset` other than `-1`.
pub async fn query(config: Config, args: QueryArgs) -> Result<Out<Rows>> {
    let format = args.format;
    let all = args.all;
    let filter = filter(args);

    if all {
        let items = config.db().export(filter).await?;
        let message = format!("Exported {}", plural(items.len(), "transaction", "transactions"));
        let rows = match format {
            OutputFormat::Json => Rows::Json(
                serde_json::to_value(&items).context("Unable to serialize the transactions")?,
            ),
            OutputFormat::Csv => Rows::Csv(to_csv(&items)?),
        };
        return Ok(Out::new(message, rows));
    }

    let result = config.db().search(filter).await?;
    let message = format!(
        "Showing {} from offset {} of {} total",
        plural(result.items.len(), "transaction", "transactions"),
        result.effective_offset,
        result.total
    );
    let rows = match format {
        OutputFormat::Json => Rows::Json(
            serde_json::to_value(&result).context("Unable to serialize the search result")?,
        ),
        OutputFormat::Csv => Rows::Csv(to_csv(&result.items)?),
    };
    Ok(Out::new(message, rows))
}

/// Shows the balance of an account, both as stored and as reported in summaries.
pub async fn balance(config: Config, account: AccountId) -> Result<Out<AccountBalance>> {
    let balance = config.db().account_balance(account).await?;
    let message = format!(
        "Balance of '{}': {}",
        balance.account.name(),
        balance.reported
    );
    Ok(Out::new(message, balance))
}

/// Lists every account with its balance, ordered by name.
pub async fn list_accounts(config: Config) -> Result<Out<Vec<AccountBalance>>> {
    let accounts = config.db().list_accounts().await?;
    let message = format!("Found {}", plural(accounts.len(), "account", "accounts"));
    Ok(Out::new(message, accounts))
}

/// Lists every category, ordered by name.
pub async fn list_categories(config: Config) -> Result<Out<Vec<Category>>> {
    let categories = config.db().list_categories().await?;
    let message = format!("Found {}", plural(categories.len(), "category", "categories"));
    Ok(Out::new(message, categories))
}

fn filter(args: QueryArgs) -> SearchFilter {
    SearchFilter {
        query: args.query,
        account_id: args.account,
        date_from: args.from,
        date_to: args.to,
        tx_type: args.tx_type,
        limit: args.limit,
        offset: args.offset,
        sort: args.sort,
        direction: args.direction,
    }
}

fn to_csv(items: &[TransactionView]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADERS)
        .context("Unable to write the CSV header")?;
    for item in items {
        writer
            .write_record([
                item.id.to_string(),
                item.date.to_string(),
                item.account_name.clone(),
                item.account_kind.to_string(),
                item.category.clone().unwrap_or_default(),
                item.description.clone().unwrap_or_default(),
                item.amount.with_format(CSV_AMOUNT).to_string(),
            ])
            .with_context(|| format!("Unable to write transaction {} as CSV", item.id))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Unable to flush the CSV writer")?;
    Ok(String::from_utf8(bytes).context("The CSV output is not valid UTF-8")?)
}
