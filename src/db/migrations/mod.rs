//! Ledger schema migrations.
//!
//! Each version `NN` has two SQL files next to this module:
//! - `migration_NN_up.sql` takes the schema from `NN-1` to `NN`
//! - `migration_NN_down.sql` takes it back from `NN` to `NN-1`
//!
//! The applied version lives in the single-row `schema_version` table.

use anyhow::{bail, Context, Result};
use sqlx::{Executor, SqliteConnection, SqlitePool};
use tracing::debug;

/// The schema version this build of the crate reads and writes.
pub(crate) const CURRENT_VERSION: i32 = 1;

struct Migration {
    version: i32,
    up_sql: &'static str,
    down_sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up_sql: include_str!("migration_01_up.sql"),
    down_sql: include_str!("migration_01_down.sql"),
}];

/// Creates `schema_version` at version 0 in a brand new database.
pub(crate) async fn bootstrap(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Unable to begin the bootstrap transaction")?;
    tx.execute("CREATE TABLE schema_version (version INTEGER NOT NULL)")
        .await
        .context("Unable to create the schema_version table")?;
    set_version(&mut tx, 0).await?;
    tx.commit()
        .await
        .context("Unable to commit the bootstrap transaction")
}

/// Reads the applied schema version.
pub(crate) async fn current_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Unable to read the schema version, is this a ledger database?")?;
    version.context("The schema_version table is empty")
}

/// Moves the schema from `current_ver` to `target_ver`, one version at a time. Every step runs in
/// its own transaction together with the `schema_version` update, so an interrupted run leaves the
/// database at the last completed version.
pub(crate) async fn run(pool: &SqlitePool, current_ver: i32, target_ver: i32) -> Result<()> {
    if current_ver == target_ver {
        debug!("Schema already at version {target_ver}");
        return Ok(());
    }

    validate_migrations(current_ver, target_ver)?;

    if current_ver < target_ver {
        for version in (current_ver + 1)..=target_ver {
            debug!("Applying migration {version:02} (up)");
            step(pool, find(version)?.up_sql, version).await?;
        }
    } else {
        for version in (target_ver + 1..=current_ver).rev() {
            debug!("Reverting migration {version:02} (down)");
            step(pool, find(version)?.down_sql, version - 1).await?;
        }
    }

    debug!("Schema now at version {target_ver}");
    Ok(())
}

fn find(version: i32) -> Result<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Migration {version} not found"))
}

async fn step(pool: &SqlitePool, sql: &str, new_version: i32) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Unable to begin the migration transaction")?;
    tx.execute(sql)
        .await
        .with_context(|| format!("Migration to version {new_version} failed"))?;
    set_version(&mut tx, new_version).await?;
    tx.commit()
        .await
        .context("Unable to commit the migration transaction")
}

async fn set_version(conn: &mut SqliteConnection, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM schema_version")
        .execute(&mut *conn)
        .await
        .context("Unable to clear schema_version")?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(&mut *conn)
        .await
        .context("Unable to write schema_version")?;
    Ok(())
}

/// Fails before anything runs if a version between the two endpoints has no migration.
fn validate_migrations(current_version: i32, target_version: i32) -> Result<()> {
    let (start, end) = if current_version < target_version {
        (current_version + 1, target_version)
    } else {
        (target_version + 1, current_version)
    };

    for version in start..=end {
        if !MIGRATIONS.iter().any(|m| m.version == version) {
            bail!(
                "Migration {version} is missing but required to migrate from version \
                {current_version} to {target_version}"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use tempfile::TempDir;

    async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
        let temp_dir = TempDir::new().context("Failed to create temp dir")?;
        let options = SqliteConnectOptions::new()
            .filename(temp_dir.path().join("test.sqlite"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to create SQLite database")?;
        bootstrap(&pool).await?;
        Ok((temp_dir, pool))
    }

    async fn table_exists(pool: &SqlitePool, table_name: &str) -> bool {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?")
                .bind(table_name)
                .fetch_one(pool)
                .await
                .unwrap();
        count > 0
    }

    #[tokio::test]
    async fn test_migration_up_creates_tables() {
        let (_temp_dir, pool) = create_test_db().await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), 0);

        run(&pool, 0, CURRENT_VERSION).await.unwrap();

        assert_eq!(current_version(&pool).await.unwrap(), CURRENT_VERSION);
        assert!(table_exists(&pool, "accounts").await);
        assert!(table_exists(&pool, "categories").await);
        assert!(table_exists(&pool, "transactions").await);
    }

    #[tokio::test]
    async fn test_migration_down_drops_tables() {
        let (_temp_dir, pool) = create_test_db().await.unwrap();
        run(&pool, 0, 1).await.unwrap();

        run(&pool, 1, 0).await.unwrap();

        assert_eq!(current_version(&pool).await.unwrap(), 0);
        assert!(!table_exists(&pool, "accounts").await);
        assert!(!table_exists(&pool, "categories").await);
        assert!(!table_exists(&pool, "transactions").await);
    }

    #[tokio::test]
    async fn test_migration_no_op_when_already_at_target() {
        let (_temp_dir, pool) = create_test_db().await.unwrap();
        run(&pool, 0, 1).await.unwrap();
        run(&pool, 1, 1).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_category_names_unique_without_case() {
        let (_temp_dir, pool) = create_test_db().await.unwrap();
        run(&pool, 0, 1).await.unwrap();
        sqlx::query("INSERT INTO categories (name, created_at) VALUES ('Food', '2025-01-01')")
            .execute(&pool)
            .await
            .unwrap();
        let dup = sqlx::query(
            "INSERT INTO categories (name, created_at) VALUES ('FOOD', '2025-01-01')",
        )
        .execute(&pool)
        .await;
        assert!(dup.is_err());
    }

    #[test]
    fn test_validate_migrations_succeeds_for_valid_range() {
        assert!(validate_migrations(0, 1).is_ok());
        assert!(validate_migrations(1, 0).is_ok());
    }

    #[test]
    fn test_validate_migrations_fails_for_missing_migration() {
        assert!(validate_migrations(0, 2).is_err());
        assert!(validate_migrations(1, 3).is_err());
    }
}
