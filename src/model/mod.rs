//! Types that represent the core data model, such as `Account`, `Category` and `Transaction`,
//! along with the pure planning and validation logic that runs before anything is persisted.
mod account;
mod amount;
mod category;
mod ids;
mod search;
mod transaction;

pub use account::{Account, AccountBalance, AccountKind, AccountUpdates, NewAccount};
pub use amount::{Amount, AmountError, AmountFormat, DecimalSeparator};
pub use category::{canonicalize, Category};
pub use ids::{AccountId, CategoryId, TransactionId};
pub use search::{
    ClassificationSums, LastPage, SearchFilter, SearchResult, SortDirection, SortKey, TxType,
    TransactionView,
};
pub use transaction::{
    parse_date, Direction, Movement, Posting, Transaction, TransactionUpdates, Transfer,
    OPENING_BALANCE,
};

pub(crate) use account::{account_name, non_empty};
pub(crate) use category::{fold, validate_name};
pub(crate) use transaction::{cents, clean};
