//! Command handlers for the homeledger CLI.
//!
//! Each handler takes the loaded [`Config`](crate::Config) and its parsed arguments, calls into the
//! ledger and returns an [`Out`] describing the outcome.

mod delete;
mod init;
mod insert;
mod query;
mod update;

use serde::Serialize;
use std::fmt::Debug;
use tracing::info;

pub use delete::{delete_account, delete_category, delete_transaction};
pub use init::init;
pub use insert::{insert_account, insert_category, insert_transaction, insert_transfer};
pub use query::{balance, list_accounts, list_categories, query, Rows};
pub use update::{update_account, update_category, update_transaction};

/// The output type for a command: a message for the user and, optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Logs the message with `info!` and writes the structured data, if any, to stdout. Data that
    /// serializes to a plain string (e.g. CSV) is written as is, anything else as pretty JSON.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(text) = self.render() {
            println!("{text}");
        }
    }

    fn render(&self) -> Option<String> {
        let value = serde_json::to_value(self.structure()?).ok()?;
        match value {
            serde_json::Value::String(s) => Some(s),
            other => serde_json::to_string_pretty(&other).ok(),
        }
    }
}

/// `"1 account"`, `"2 accounts"`.
fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}
