use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;
use tracing::debug;

/// Creates the home directory with:
/// - an initial `config.json` holding the default settings
/// - an empty ledger database
///
/// # Arguments
/// - `home` - The directory that will hold the ledger, e.g. `$HOME/homeledger`
///
/// # Errors
/// - Returns a `Config` error if the directory already holds a ledger.
/// - Returns an error if any file operation fails.
pub async fn init(home: &Path) -> Result<Out<()>> {
    let config = Config::create(home).await?;
    debug!("Wrote {}", config.config_path().display());
    Ok(format!(
        "Successfully created the ledger in {} with database {}",
        config.root().display(),
        config.sqlite_path().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_twice() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("ledger");
        let out = init(&home).await.unwrap();
        assert!(out.message().contains("Successfully created"));
        assert!(out.message().ends_with("ledger.sqlite"));
        assert!(Config::load(&home).await.is_ok());

        let err = init(&home).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
