//! These structs provide the CLI interface for the homeledger CLI.

use crate::model::{
    parse_date, AccountId, AccountKind, Amount, CategoryId, Direction, SortDirection, SortKey,
    TransactionId, TxType,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// homeledger: A command-line tool for keeping a personal ledger.
///
/// Accounts hold dated, signed transactions. Balances are always computed from the transactions,
/// never stored. Transfers and reimbursement mirrors write all of their rows or none of them.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory, its config file and an empty ledger.
    ///
    /// This is the first command you should run. By default the home directory is
    /// $HOME/homeledger; pass --home or set HOMELEDGER_HOME to put it somewhere else.
    Init,
    /// Add an account, category, transaction or transfer.
    Insert(InsertArgs),
    /// Change an account, category or transaction. Only the fields you pass are changed.
    Update(UpdateArgs),
    /// Delete an account, category or transaction.
    ///
    /// Accounts and categories that are still referenced by transactions cannot be deleted.
    Delete(DeleteArgs),
    /// List accounts with their balances, or categories.
    List(ListArgs),
    /// Show the balance of one account.
    Balance(BalanceArgs),
    /// Search transactions with filters, sorting and pagination.
    Query(QueryArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the ledger and its configuration are held. Defaults to ~/homeledger
    #[arg(long, env = "HOMELEDGER_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

// =============================================================================
// insert
// =============================================================================

#[derive(Debug, Parser, Clone)]
pub struct InsertArgs {
    #[command(subcommand)]
    entity: InsertSubcommand,
}

impl InsertArgs {
    pub fn entity(&self) -> &InsertSubcommand {
        &self.entity
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum InsertSubcommand {
    /// Create an account, optionally with an opening balance.
    Account(InsertAccountArgs),
    /// Create a category.
    Category(InsertCategoryArgs),
    /// Record an income or an expense, optionally mirrored onto a reimbursable account.
    Transaction(InsertTransactionArgs),
    /// Move money from one account to another.
    Transfer(InsertTransferArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct InsertAccountArgs {
    /// The display name of the account.
    pub name: String,

    /// A display color, stored as given.
    #[arg(long)]
    pub color: Option<String>,

    /// "standard" for money you hold, "reimbursable" for money owed back to you.
    #[arg(long, default_value_t = AccountKind::Standard)]
    pub kind: AccountKind,

    /// Written as a transaction dated today. Either `1,234.56` or `1.234,56` is accepted.
    #[arg(long, allow_hyphen_values = true)]
    pub opening_balance: Option<Amount>,
}

#[derive(Debug, Parser, Clone)]
pub struct InsertCategoryArgs {
    /// The category name. Must not match an existing category, ignoring case.
    pub name: String,
}

#[derive(Debug, Parser, Clone)]
pub struct InsertTransactionArgs {
    /// The account the transaction belongs to.
    #[arg(long)]
    pub account: AccountId,

    /// The amount. Only its magnitude is used; the sign comes from --direction.
    #[arg(long, allow_hyphen_values = true)]
    pub amount: Amount,

    /// "income" or "expense".
    #[arg(long, default_value_t = Direction::Expense)]
    pub direction: Direction,

    /// The date as YYYY-MM-DD. Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub description: Option<String>,

    /// Matched against existing categories ignoring case; created if there is no match.
    #[arg(long)]
    pub category: Option<String>,

    /// A reimbursable account that receives an identical copy of the transaction.
    #[arg(long)]
    pub mirror_to: Option<AccountId>,
}

#[derive(Debug, Parser, Clone)]
pub struct InsertTransferArgs {
    /// The account the money leaves.
    #[arg(long)]
    pub from: AccountId,

    /// The account the money arrives in.
    #[arg(long)]
    pub to: AccountId,

    /// The amount. Only its magnitude is used.
    #[arg(long, allow_hyphen_values = true)]
    pub amount: Amount,

    /// The date as YYYY-MM-DD. Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Text placed in front of the generated description.
    #[arg(long)]
    pub note: Option<String>,
}

// =============================================================================
// update
// =============================================================================

#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    #[command(subcommand)]
    entity: UpdateSubcommand,
}

impl UpdateArgs {
    pub fn entity(&self) -> &UpdateSubcommand {
        &self.entity
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum UpdateSubcommand {
    /// Rename an account or change its color.
    Account(UpdateAccountArgs),
    /// Rename a category.
    Category(UpdateCategoryArgs),
    /// Change any field of a transaction.
    Transaction(UpdateTransactionArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct UpdateAccountArgs {
    pub id: AccountId,

    #[arg(long)]
    pub name: Option<String>,

    /// Pass an empty string to clear the color.
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct UpdateCategoryArgs {
    pub id: CategoryId,

    #[arg(long)]
    pub name: String,
}

#[derive(Debug, Parser, Clone)]
pub struct UpdateTransactionArgs {
    pub id: TransactionId,

    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// The new signed amount.
    #[arg(long, allow_hyphen_values = true)]
    pub amount: Option<Amount>,

    #[arg(long)]
    pub account: Option<AccountId>,

    /// Pass an empty string to clear the description.
    #[arg(long)]
    pub description: Option<String>,

    /// Pass an empty string to clear the category.
    #[arg(long)]
    pub category: Option<String>,
}

// =============================================================================
// delete, list, balance
// =============================================================================

#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    #[command(subcommand)]
    entity: DeleteSubcommand,
}

impl DeleteArgs {
    pub fn entity(&self) -> &DeleteSubcommand {
        &self.entity
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum DeleteSubcommand {
    /// Delete an account that has no transactions.
    Account { id: AccountId },
    /// Delete a category that no transaction uses.
    Category { id: CategoryId },
    /// Delete a transaction.
    Transaction { id: TransactionId },
}

#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    #[command(subcommand)]
    entity: ListSubcommand,
}

impl ListArgs {
    pub fn entity(&self) -> ListSubcommand {
        self.entity
    }
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ListSubcommand {
    /// Every account with its balance.
    Accounts,
    /// Every category.
    Categories,
}

#[derive(Debug, Parser, Clone)]
pub struct BalanceArgs {
    pub account: AccountId,
}

// =============================================================================
// query
// =============================================================================

/// The rendering of query results.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

serde_plain::derive_display_from_serialize!(OutputFormat);
serde_plain::derive_fromstr_from_deserialize!(OutputFormat);

#[derive(Debug, Parser, Clone, Default)]
pub struct QueryArgs {
    /// Text matched, ignoring case, against description, category and account name.
    #[arg(long)]
    pub query: Option<String>,

    /// Only transactions of this account.
    #[arg(long)]
    pub account: Option<AccountId>,

    /// Earliest date, inclusive, as YYYY-MM-DD.
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Latest date, inclusive, as YYYY-MM-DD.
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// "all", "income" or "expense".
    #[arg(long = "type", default_value_t = TxType::All)]
    pub tx_type: TxType,

    /// Rows per page. Defaults to the page_size in config.json.
    #[arg(long)]
    pub limit: Option<u32>,

    /// The row offset of the page. -1 returns the last page.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub offset: i64,

    /// date, category, description, amount, account or id.
    #[arg(long, default_value_t = SortKey::Date)]
    pub sort: SortKey,

    /// "asc" or "desc".
    #[arg(long, default_value_t = SortDirection::Desc)]
    pub direction: SortDirection,

    /// "json" or "csv".
    #[arg(long, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Return every matching row instead of one page.
    #[arg(long)]
    pub all: bool,
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("homeledger"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or HOMELEDGER_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("homeledger")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["homeledger", "--home", "/tmp/ledger"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_insert_transaction_args() {
        let args = parse(&[
            "insert",
            "transaction",
            "--account",
            "3",
            "--amount",
            "-1.234,50",
            "--direction",
            "income",
            "--date",
            "2025-03-14",
            "--category",
            "Salary",
        ]);
        let Command::Insert(insert) = args.command() else {
            panic!("expected insert");
        };
        let InsertSubcommand::Transaction(tx) = insert.entity() else {
            panic!("expected transaction");
        };
        assert_eq!(tx.account, AccountId::new(3));
        assert_eq!(tx.amount.to_cents(), Some(-123450));
        assert_eq!(tx.direction, Direction::Income);
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(tx.mirror_to, None);
    }

    #[test]
    fn test_query_args() {
        let args = parse(&[
            "query", "--offset", "-1", "--type", "expense", "--sort", "amount", "--direction",
            "asc", "--format", "csv",
        ]);
        let Command::Query(query) = args.command() else {
            panic!("expected query");
        };
        assert_eq!(query.offset, -1);
        assert_eq!(query.tx_type, TxType::Expense);
        assert_eq!(query.sort, SortKey::Amount);
        assert_eq!(query.direction, SortDirection::Asc);
        assert_eq!(query.format, OutputFormat::Csv);
        assert!(!query.all);
    }

    #[test]
    fn test_bad_date_rejected() {
        let argv = [
            "homeledger", "insert", "transfer", "--from", "1", "--to", "2", "--amount", "5",
            "--date", "2025-13-01",
        ];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_home_flag() {
        let args = parse(&["list", "accounts"]);
        assert_eq!(args.common().home().path(), Path::new("/tmp/ledger"));
        assert_eq!(args.common().log_level(), LevelFilter::INFO);
    }
}
