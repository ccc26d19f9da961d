use crate::error::{Error, Result};
use crate::model::{AccountId, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an account's balance is interpreted in summaries.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Cash held by the user: checking, savings, wallet.
    #[default]
    Standard,
    /// Money tracked for reimbursement. A positive ledger balance here is owed to the user, so
    /// summaries report it with the sign inverted. Storage is never inverted.
    Reimbursable,
}

serde_plain::derive_display_from_serialize!(AccountKind);
serde_plain::derive_fromstr_from_deserialize!(AccountKind);

impl AccountKind {
    /// Converts a ledger balance into the balance shown in summaries.
    pub fn reported(self, balance: Amount) -> Amount {
        match self {
            AccountKind::Standard => balance,
            AccountKind::Reimbursable => balance.negate(),
        }
    }
}

/// A named account. The balance is never stored; see [`AccountBalance`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Account {
    pub(crate) id: AccountId,
    pub(crate) name: String,
    pub(crate) color: Option<String>,
    pub(crate) kind: AccountKind,
    pub(crate) created_at: DateTime<Utc>,
}

impl Account {
    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// An account together with its computed balance.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountBalance {
    pub account: Account,
    /// The signed sum of every transaction on the account.
    pub balance: Amount,
    /// `balance` as shown in summaries, inverted for reimbursable accounts.
    pub reported: Amount,
}

impl AccountBalance {
    pub(crate) fn new(account: Account, balance: Amount) -> Self {
        let reported = account.kind.reported(balance);
        Self {
            account,
            balance,
            reported,
        }
    }
}

/// The data needed to create an account.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NewAccount {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub kind: AccountKind,
    /// When present and non-zero, an opening transaction is written with the account.
    #[serde(default)]
    pub opening_balance: Option<Amount>,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn opening_balance(mut self, amount: Amount) -> Self {
        self.opening_balance = Some(amount);
        self
    }

    /// Trims the name and color, and rejects an empty name or an opening balance that cannot be
    /// stored.
    pub(crate) fn normalized(self) -> Result<Self> {
        if let Some(amount) = self.opening_balance {
            super::transaction::cents(amount)?;
        }
        Ok(Self {
            name: account_name(&self.name)?,
            color: non_empty(self.color),
            ..self
        })
    }
}

/// A partial update of an account. Absent fields are left untouched. Classification cannot be
/// changed once an account exists.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountUpdates {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some("")` clears the color.
    #[serde(default)]
    pub color: Option<String>,
}

impl AccountUpdates {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }
}

pub(crate) fn account_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Account name must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
