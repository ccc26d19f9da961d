//! Configuration file handling.
//!
//! The configuration file is stored at `$HOMELEDGER_HOME/config.json` next to the ledger database
//! `ledger.sqlite`. It carries the query defaults used by the engine.

use crate::db::{Db, Settings, DEFAULT_PAGE_SIZE};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::LastPage;
use crate::{utils, Result};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_NAME: &str = "homeledger";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const LEDGER_SQLITE: &str = "ledger.sqlite";

/// The `Config` object represents a ledger home directory. It is created from the path to
/// `$HOMELEDGER_HOME` and from there loads `config.json` and opens the database.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the home directory if needed, writes a default `config.json` and initializes an
    /// empty ledger database.
    ///
    /// # Errors
    /// - Returns a `Config` error if the directory already holds a configuration or a database.
    /// - Returns an error if any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the home directory")
            .pub_result(ErrorType::Config)?;
        let root = utils::canonicalize(&maybe_relative)
            .await
            .pub_result(ErrorType::Config)?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            return Err(Error::new(
                ErrorType::Config,
                format!("A config file already exists at '{}'", config_path.display()),
            ));
        }

        let sqlite_path = root.join(LEDGER_SQLITE);
        let config_file = ConfigFile::default();
        let db = Db::init(&sqlite_path)
            .await?
            .with_settings(config_file.settings());
        config_file.save(&config_path).await?;

        debug!("Created home directory {}", root.display());
        Ok(Self {
            root,
            config_path,
            db,
            sqlite_path,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load and validate the config file
    /// - open the database, migrating it if it is out of date
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The home directory is missing, run 'homeledger init' first")
            .pub_result(ErrorType::Config)?;
        let _ = utils::read_dir(&root)
            .await
            .pub_result(ErrorType::Config)?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            return Err(Error::new(
                ErrorType::Config,
                format!("The config file is missing '{}'", config_path.display()),
            ));
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let sqlite_path = root.join(LEDGER_SQLITE);
        let db = Db::load(&sqlite_path)
            .await?
            .with_settings(config_file.settings());

        Ok(Self {
            root,
            config_path,
            db,
            sqlite_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "homeledger",
///   "config_version": 1,
///   "page_size": 25,
///   "last_page": "window"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "homeledger"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Rows per page when a search does not set a limit
    #[serde(default = "default_page_size")]
    page_size: u32,

    /// How the last-page offset is computed
    #[serde(default)]
    last_page: LastPage,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            page_size: DEFAULT_PAGE_SIZE,
            last_page: LastPage::default(),
        }
    }
}

impl ConfigFile {
    /// Loads and validates a ConfigFile from the specified path.
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await.pub_result(ErrorType::Config)?;
        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
            .pub_result(ErrorType::Config)?;
        config.validate().pub_result(ErrorType::Config)?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            self.app_name
        );
        ensure!(
            self.config_version <= CONFIG_VERSION,
            "Config version {} is newer than the supported version {}",
            self.config_version,
            CONFIG_VERSION
        );
        ensure!(self.page_size > 0, "page_size must be greater than zero");
        Ok(())
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self)
            .context("Unable to serialize config")
            .pub_result(ErrorType::Config)?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
            .pub_result(ErrorType::Config)
    }

    fn settings(&self) -> Settings {
        Settings {
            page_size: self.page_size,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("ledger_home");

        let config = Config::create(&home).await.unwrap();
        assert!(config.config_path().is_file());
        assert!(config.sqlite_path().is_file());
        assert_eq!(config.db().settings(), Settings::default());
        assert_eq!(config.db().settings().last_page, LastPage::Window);
        config.db().close().await;

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.root(), config.root());
        assert_eq!(loaded.db().settings().page_size, 25);
    }

    #[tokio::test]
    async fn test_config_create_refuses_existing_home() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().to_owned();
        let config = Config::create(&home).await.unwrap();
        config.db().close().await;
        let err = Config::create(&home).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_settings_flow_into_db() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().to_owned();
        let config = Config::create(&home).await.unwrap();
        config.db().close().await;

        let json = r#"{
            "app_name": "homeledger",
            "config_version": 1,
            "page_size": 10,
            "last_page": "aligned"
        }"#;
        utils::write(config.config_path(), json).await.unwrap();

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(
            loaded.db().settings(),
            Settings {
                page_size: 10,
                last_page: LastPage::Aligned
            }
        );
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let original = ConfigFile {
            page_size: 50,
            ..Default::default()
        };
        original.save(&config_path).await.unwrap();
        let loaded = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{ "app_name": "homeledger", "config_version": 1 }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.last_page, LastPage::Window);
    }

    #[tokio::test]
    async fn test_config_file_rejects_wrong_app_and_zero_page() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        utils::write(&config_path, r#"{ "app_name": "budgetbook", "config_version": 1 }"#)
            .await
            .unwrap();
        let err = ConfigFile::load(&config_path).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
        assert!(err.to_string().contains("app_name"));

        utils::write(
            &config_path,
            r#"{ "app_name": "homeledger", "config_version": 1, "page_size": 0 }"#,
        )
        .await
        .unwrap();
        assert!(ConfigFile::load(&config_path).await.is_err());
    }
}
