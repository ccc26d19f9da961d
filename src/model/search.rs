//! The query contract: filters, ordering, pagination and aggregate sums.

use crate::error::{Error, Result};
use crate::model::{AccountId, AccountKind, Amount, CategoryId, TransactionId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Restricts results by the sign of the amount.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    #[default]
    All,
    /// `amount > 0`
    Income,
    /// `amount < 0`
    Expense,
}

serde_plain::derive_display_from_serialize!(TxType);
serde_plain::derive_fromstr_from_deserialize!(TxType);

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Category,
    Description,
    Amount,
    Account,
    Id,
}

serde_plain::derive_display_from_serialize!(SortKey);
serde_plain::derive_fromstr_from_deserialize!(SortKey);

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

serde_plain::derive_display_from_serialize!(SortDirection);
serde_plain::derive_fromstr_from_deserialize!(SortDirection);

/// How the offset of the last page is derived when the last-page sentinel is requested.
///
/// Neither policy is `max(0, total - page_size)` rounded down to a page boundary. `Window` leaves
/// out the rounding so the last page holds the final `page_size` rows, which keeps offset `-1`
/// equal to offset `max(0, total - page_size)`. `Aligned` starts at the boundary of the page that
/// holds the last row, so it lines up with pages read forward from offset 0.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastPage {
    /// The final `page_size` rows: `max(0, total - page_size)`.
    #[default]
    Window,
    /// The last page boundary: `floor((total - 1) / page_size) * page_size`.
    Aligned,
}

serde_plain::derive_display_from_serialize!(LastPage);
serde_plain::derive_fromstr_from_deserialize!(LastPage);

impl LastPage {
    /// The offset of the last page for `total` matching rows.
    pub fn offset(self, total: u64, page_size: u32) -> u64 {
        let page = u64::from(page_size.max(1));
        match self {
            LastPage::Window => total.saturating_sub(page),
            LastPage::Aligned => total.saturating_sub(1) / page * page,
        }
    }
}

/// A search request. Every field is optional; the default returns the first page of all
/// transactions, newest first.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SearchFilter {
    /// Case-insensitive substring matched against description, category name and account name.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Inclusive.
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Inclusive.
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub tx_type: TxType,
    /// Page size. Falls back to the configured default when absent.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Row offset of the page, or [`SearchFilter::LAST_PAGE`].
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SearchFilter {
    /// The offset sentinel that requests the last page under the current filter and sort.
    pub const LAST_PAGE: i64 = -1;

    /// The trimmed free-text query, if there is one, folded the way SQLite's `LOWER` folds the
    /// stored text: ASCII letters only.
    pub(crate) fn needle(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_ascii_lowercase)
    }

    /// The page size to use, validated.
    pub(crate) fn page_size(&self, default: u32) -> Result<u32> {
        match self.limit.unwrap_or(default) {
            0 => Err(Error::validation("Page size must be greater than zero")),
            n => Ok(n),
        }
    }

    /// Resolves the requested offset against the number of matching rows.
    pub(crate) fn effective_offset(
        &self,
        total: u64,
        page_size: u32,
        policy: LastPage,
    ) -> Result<u64> {
        match self.offset {
            Self::LAST_PAGE => Ok(policy.offset(total, page_size)),
            n if n < 0 => Err(Error::validation(format!(
                "Offset {n} is invalid, use a non-negative offset or {} for the last page",
                Self::LAST_PAGE
            ))),
            n => Ok((n as u64).min(total)),
        }
    }
}

/// Sums split by the classification of the account that owns each transaction.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClassificationSums {
    pub standard: Amount,
    pub reimbursable: Amount,
}

impl ClassificationSums {
    pub fn get(&self, kind: AccountKind) -> Amount {
        match kind {
            AccountKind::Standard => self.standard,
            AccountKind::Reimbursable => self.reimbursable,
        }
    }
}

/// A transaction joined with the names of its account and category.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransactionView {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub account_name: String,
    pub account_color: Option<String>,
    pub account_kind: AccountKind,
    pub date: NaiveDate,
    pub category_id: Option<CategoryId>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// One page of results plus aggregates over the whole filtered set.
///
/// The sums ignore the `tx_type` restriction: both income and expense totals are always
/// reported for the rest of the filter.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SearchResult {
    pub items: Vec<TransactionView>,
    /// Number of rows matching the full filter, including `tx_type`.
    pub total: u64,
    /// The offset the page was actually taken from.
    pub effective_offset: u64,
    pub sum_income: Amount,
    pub sum_expense: Amount,
    pub income_by_classification: ClassificationSums,
    pub expense_by_classification: ClassificationSums,
}
