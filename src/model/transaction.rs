//! Transactions and the write intents that produce them.
//!
//! Every write intent is planned into a list of [`Posting`]s before anything touches the store.
//! The planning functions are pure; the database layer executes a plan inside a single unit of
//! work so that either every posting of an intent is committed or none is.

use crate::error::{Error, Result};
use crate::model::{Account, AccountId, AccountKind, Amount, CategoryId, TransactionId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Description given to the transaction written when an account is created with an opening
/// balance.
pub const OPENING_BALANCE: &str = "Opening balance";

/// A single signed, dated movement on one account. Positive amounts are income, negative
/// amounts are expenses; there is no other type flag.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub(crate) id: TransactionId,
    pub(crate) account_id: AccountId,
    pub(crate) date: NaiveDate,
    pub(crate) description: Option<String>,
    pub(crate) amount: Amount,
    pub(crate) category_id: Option<CategoryId>,
    pub(crate) created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Whether a movement adds money to or removes money from its account.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Income,
    #[default]
    Expense,
}

serde_plain::derive_display_from_serialize!(Direction);
serde_plain::derive_fromstr_from_deserialize!(Direction);

impl Direction {
    /// Gives `amount` the sign of this direction regardless of the sign it was entered with.
    pub fn apply(self, amount: Amount) -> Amount {
        match self {
            Direction::Income => amount.abs(),
            Direction::Expense => amount.abs().negate(),
        }
    }
}

/// One planned row of a write intent.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Posting {
    pub(crate) account_id: AccountId,
    pub(crate) date: NaiveDate,
    pub(crate) description: Option<String>,
    /// Minor units.
    pub(crate) cents: i64,
    pub(crate) category_id: Option<CategoryId>,
}

impl Posting {
    pub(crate) fn new(
        account_id: AccountId,
        date: NaiveDate,
        description: Option<String>,
        amount: Amount,
        category_id: Option<CategoryId>,
    ) -> Result<Self> {
        Ok(Self {
            account_id,
            date,
            description,
            cents: cents(amount)?,
            category_id,
        })
    }

    /// The implicit transaction written alongside a new account.
    pub(crate) fn opening(account_id: AccountId, date: NaiveDate, amount: Amount) -> Result<Self> {
        Self::new(
            account_id,
            date,
            Some(OPENING_BALANCE.to_string()),
            amount,
            None,
        )
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn amount(&self) -> Amount {
        Amount::from_cents(self.cents)
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }
}

/// An income or expense on one account, optionally mirrored onto a reimbursable account.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Movement {
    pub account_id: AccountId,
    pub date: NaiveDate,
    /// The magnitude is taken from here, the sign from `direction`.
    pub amount: Amount,
    pub direction: Direction,
    #[serde(default)]
    pub description: Option<String>,
    /// Free text, canonicalized against the category directory when written.
    #[serde(default)]
    pub category: Option<String>,
    /// A reimbursable account that receives an identical copy of this movement.
    #[serde(default)]
    pub mirror_to: Option<AccountId>,
}

impl Movement {
    pub fn new(
        account_id: AccountId,
        date: NaiveDate,
        amount: Amount,
        direction: Direction,
    ) -> Self {
        Self {
            account_id,
            date,
            amount,
            direction,
            description: None,
            category: None,
            mirror_to: None,
        }
    }

    pub fn expense(account_id: AccountId, date: NaiveDate, amount: Amount) -> Self {
        Self::new(account_id, date, amount, Direction::Expense)
    }

    pub fn income(account_id: AccountId, date: NaiveDate, amount: Amount) -> Self {
        Self::new(account_id, date, amount, Direction::Income)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn mirror_to(mut self, account_id: AccountId) -> Self {
        self.mirror_to = Some(account_id);
        self
    }

    /// The amount with the sign of `direction` applied.
    pub fn signed_amount(&self) -> Amount {
        self.direction.apply(self.amount)
    }

    /// Plans the rows for this movement: the primary row on `primary` and, when `mirror` is
    /// given, an identical row on the reimbursable account.
    pub fn postings(
        &self,
        primary: &Account,
        mirror: Option<&Account>,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Posting>> {
        if primary.id != self.account_id {
            return Err(Error::validation(format!(
                "Account {} does not match the movement's account {}",
                primary.id, self.account_id
            )));
        }
        let description = clean(self.description.as_deref());
        let row = Posting::new(
            primary.id,
            self.date,
            description,
            self.signed_amount(),
            category_id,
        )?;

        let mut rows = vec![row];
        if let Some(mirror) = mirror {
            if primary.kind != AccountKind::Standard {
                return Err(Error::validation(format!(
                    "Only movements on standard accounts can be mirrored, '{}' is {}",
                    primary.name, primary.kind
                )));
            }
            if mirror.kind != AccountKind::Reimbursable {
                return Err(Error::validation(format!(
                    "Mirror account '{}' must be reimbursable, it is {}",
                    mirror.name, mirror.kind
                )));
            }
            let copy = Posting {
                account_id: mirror.id,
                ..rows[0].clone()
            };
            rows.push(copy);
        }
        Ok(rows)
    }
}

/// Money moved from one account to another.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transfer {
    pub from: AccountId,
    pub to: AccountId,
    pub date: NaiveDate,
    /// Only the magnitude is used.
    pub amount: Amount,
    /// Optional user text, kept in front of the generated description.
    #[serde(default)]
    pub note: Option<String>,
}

impl Transfer {
    pub fn new(from: AccountId, to: AccountId, date: NaiveDate, amount: Amount) -> Self {
        Self {
            from,
            to,
            date,
            amount,
            note: None,
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Plans the debit on `from` followed by the credit on `to`. Both rows share the date and a
    /// description naming the two accounts.
    pub fn postings(&self, from: &Account, to: &Account) -> Result<[Posting; 2]> {
        if from.id != self.from || to.id != self.to {
            return Err(Error::validation(
                "Accounts do not match the transfer's source and destination",
            ));
        }
        if from.id == to.id {
            return Err(Error::validation(
                "A transfer needs two different accounts",
            ));
        }
        if self.amount.is_zero() {
            return Err(Error::validation("A transfer amount must not be zero"));
        }

        let generated = format!("Transfer from {} to {}", from.name, to.name);
        let description = match clean(self.note.as_deref()) {
            Some(note) => format!("{note} ({generated})"),
            None => generated,
        };

        let debit = Posting::new(
            from.id,
            self.date,
            Some(description.clone()),
            self.amount.abs().negate(),
            None,
        )?;
        let credit = Posting::new(
            to.id,
            self.date,
            Some(description),
            self.amount.abs(),
            None,
        )?;
        Ok([debit, credit])
    }
}

/// A partial update of a transaction. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransactionUpdates {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// The new signed amount.
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// `Some("")` clears the description.
    #[serde(default)]
    pub description: Option<String>,
    /// Free text canonicalized against the category directory. `Some("")` clears the category.
    #[serde(default)]
    pub category: Option<String>,
}

impl TransactionUpdates {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.amount.is_none()
            && self.account_id.is_none()
            && self.description.is_none()
            && self.category.is_none()
    }
}

/// Parses an ISO `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::validation(format!("Invalid date '{}': {e}", s.trim())))
}

/// Converts an amount to storage units or explains why it cannot be stored.
pub(crate) fn cents(amount: Amount) -> Result<i64> {
    amount.to_cents().ok_or_else(|| {
        Error::validation(format!(
            "Amount {amount} cannot be stored, use at most two decimal places"
        ))
    })
}

/// Trims optional text, mapping empty text to `None`.
pub(crate) fn clean(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
