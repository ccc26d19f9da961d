use crate::error::{Error, Result};
use crate::model::CategoryId;
use serde::{Deserialize, Serialize};

/// A user-defined category. Names are unique under case-insensitive comparison.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Category {
    pub(crate) id: CategoryId,
    pub(crate) name: String,
}

impl Category {
    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Resolves free-text category input against the names that already exist.
///
/// - Surrounding whitespace is trimmed; empty input means "no category" and yields `None`.
/// - If an existing name matches case-insensitively, that existing spelling is returned, so
///   `food` typed by the user resolves to an existing `Food`.
/// - Otherwise the trimmed input is returned as the name of a category to be created.
///
/// ```
/// # use homeledger::model::canonicalize;
/// let existing = ["Food", "Rent"];
/// assert_eq!(canonicalize(" food ", existing).as_deref(), Some("Food"));
/// assert_eq!(canonicalize("Travel", existing).as_deref(), Some("Travel"));
/// assert_eq!(canonicalize("  ", existing), None);
/// ```
pub fn canonicalize<'a, I>(raw: &str, existing: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let folded = fold(trimmed);
    let name = existing
        .into_iter()
        .find(|name| fold(name) == folded)
        .unwrap_or(trimmed);
    Some(name.to_string())
}

/// Case folding used for every category name comparison.
pub(crate) fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Trims `name` and rejects it if nothing is left.
pub(crate) fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Category name must not be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_prefers_existing_spelling() {
        let existing = vec!["Food".to_string(), "Groceries".to_string()];
        let got = canonicalize("FOOD", existing.iter().map(String::as_str));
        assert_eq!(got.as_deref(), Some("Food"));
    }

    #[test]
    fn test_canonicalize_new_name_is_trimmed() {
        let got = canonicalize("  Pet Supplies\t", ["Food"]);
        assert_eq!(got.as_deref(), Some("Pet Supplies"));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert_eq!(canonicalize("", ["Food"]), None);
        assert_eq!(canonicalize(" \n ", Vec::<&str>::new()), None);
    }

    #[test]
    fn test_canonicalize_unicode_case() {
        let got = canonicalize("ÉPICERIE", ["Épicerie"]);
        assert_eq!(got.as_deref(), Some("Épicerie"));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Rent ").unwrap(), "Rent");
        assert!(validate_name("   ").is_err());
    }
}
