//! homeledger keeps a personal ledger in a local SQLite database.
//!
//! Accounts hold dated, signed transactions and their balances are always derived from those
//! transactions. Multi-row writes (transfers, reimbursement mirrors, opening balances) are applied
//! as a single unit of work. Reads go through a filtered, sorted and paginated search that also
//! reports income and expense totals over the whole filtered set.

pub mod args;
pub mod commands;
mod config;
pub mod db;
mod error;
pub mod model;
mod utils;


pub use config::Config;
pub use db::{Db, Settings};
pub use error::{Error, ErrorType, Result};
