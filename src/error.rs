//! The public error type.
//!
//! Internally the crate builds errors with `anyhow` so that context can be attached at every
//! layer. At the boundary every error is stamped with an [`ErrorType`] so that callers can tell a
//! referential failure (e.g. deleting an account that still has transactions) apart from a
//! storage failure without inspecting message text.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The class of an [`Error`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Unparseable amount, empty required field, invalid date or an otherwise malformed request.
    /// Always raised before anything is written.
    Validation,
    /// A category name collides, case-insensitively, with an existing category.
    Conflict,
    /// The account still has transactions referencing it.
    AccountInUse,
    /// The category still has transactions referencing it.
    CategoryInUse,
    /// The requested id does not exist.
    NotFound,
    /// The underlying store failed. The unit of work in flight has been rolled back.
    Storage,
    /// The home directory or configuration file is missing or invalid.
    Config,
}

serde_plain::derive_display_from_serialize!(ErrorType);

impl ErrorType {
    /// Returns `true` for `AccountInUse` and `CategoryInUse`.
    pub fn is_referential(self) -> bool {
        matches!(self, ErrorType::AccountInUse | ErrorType::CategoryInUse)
    }
}

/// The error type returned by every public operation in this crate.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(error_type: ErrorType, message: impl Display) -> Self {
        Self {
            error_type,
            inner: anyhow::anyhow!("{message}"),
        }
    }

    pub fn validation(message: impl Display) -> Self {
        Self::new(ErrorType::Validation, message)
    }

    pub fn not_found(message: impl Display) -> Self {
        Self::new(ErrorType::NotFound, message)
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn is_referential(&self) -> bool {
        self.error_type.is_referential()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for Error {
    fn from(inner: anyhow::Error) -> Self {
        let error_type = storage_error_type(&inner);
        Self { error_type, inner }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        anyhow::Error::from(e).into()
    }
}

/// Unique violations surface as conflicts, everything else that comes out of the store is a
/// storage failure.
fn storage_error_type(e: &anyhow::Error) -> ErrorType {
    let unique = e
        .chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .any(|sql| match sql {
            sqlx::Error::Database(db) => db.is_unique_violation(),
            _ => false,
        });
    if unique {
        ErrorType::Conflict
    } else {
        ErrorType::Storage
    }
}

/// Stamps an [`ErrorType`] onto a result coming from `anyhow` or `sqlx`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error {
            error_type,
            inner: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_referential_types() {
        assert!(ErrorType::AccountInUse.is_referential());
        assert!(ErrorType::CategoryInUse.is_referential());
        assert!(!ErrorType::NotFound.is_referential());
        assert!(!ErrorType::Storage.is_referential());
    }

    #[test]
    fn test_display_includes_context_chain() {
        let result: std::result::Result<(), anyhow::Error> =
            Err(anyhow::anyhow!("disk full")).context("Unable to write row");
        let e = result.pub_result(ErrorType::Storage).unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Storage);
        assert_eq!(e.to_string(), "Unable to write row: disk full");
    }

    #[test]
    fn test_anyhow_defaults_to_storage() {
        let e: Error = anyhow::anyhow!("boom").into();
        assert_eq!(e.error_type(), ErrorType::Storage);
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ErrorType::CategoryInUse.to_string(), "category_in_use");
    }
}
