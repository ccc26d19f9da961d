//! The category directory.

use super::guard::{ensure_category_name_free, ensure_category_unused};
use super::Db;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{canonicalize, fold, validate_name, Category, CategoryId};
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};
use tracing::{debug, info};

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
        }
    }
}

impl Db {
    /// Every category, ordered by name without regard to case.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .context("Unable to acquire a connection")
            .pub_result(ErrorType::Storage)?;
        all(&mut conn).await
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .context("Unable to acquire a connection")
            .pub_result(ErrorType::Storage)?;
        get(&mut conn, id).await
    }

    /// Resolves free text against the current directory. See [`canonicalize`].
    pub async fn canonicalize_category(&self, raw: &str) -> Result<Option<String>> {
        let existing = self.list_categories().await?;
        Ok(canonicalize(raw, existing.iter().map(Category::name)))
    }

    /// Creates a category. Fails with `Conflict` if the name is taken under any casing.
    pub async fn create_category(&self, name: &str) -> Result<Category> {
        let name = validate_name(name)?;
        let mut uow = self.unit_of_work().await?;
        ensure_category_name_free(uow.conn(), &name, None).await?;
        let category = insert(uow.conn(), &name).await?;
        uow.commit().await?;
        info!("Created category {} '{}'", category.id, category.name);
        Ok(category)
    }

    /// Renames a category. Changing only the case of its own name is allowed.
    pub async fn rename_category(&self, id: CategoryId, name: &str) -> Result<Category> {
        let name = validate_name(name)?;
        let mut uow = self.unit_of_work().await?;
        get(uow.conn(), id).await?;
        ensure_category_name_free(uow.conn(), &name, Some(id)).await?;
        sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(&name)
            .bind(id)
            .execute(uow.conn())
            .await
            .with_context(|| format!("Unable to rename category {id}"))?;
        let category = get(uow.conn(), id).await?;
        uow.commit().await?;
        info!("Renamed category {id} to '{name}'");
        Ok(category)
    }

    /// Deletes a category. Fails with `CategoryInUse` while any transaction references it.
    pub async fn delete_category(&self, id: CategoryId) -> Result<Category> {
        let mut uow = self.unit_of_work().await?;
        let category = get(uow.conn(), id).await?;
        ensure_category_unused(uow.conn(), id, &category.name).await?;
        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(uow.conn())
            .await
            .with_context(|| format!("Unable to delete category {id}"))?;
        uow.commit().await?;
        info!("Deleted category {id} '{}'", category.name);
        Ok(category)
    }
}

pub(crate) async fn all(conn: &mut SqliteConnection) -> Result<Vec<Category>> {
    let rows: Vec<CategoryRow> =
        sqlx::query_as("SELECT id, name FROM categories ORDER BY name COLLATE NOCASE, id")
            .fetch_all(&mut *conn)
            .await
            .context("Unable to list categories")?;
    Ok(rows.into_iter().map(Category::from).collect())
}

pub(crate) async fn get(conn: &mut SqliteConnection, id: CategoryId) -> Result<Category> {
    let row: Option<CategoryRow> = sqlx::query_as("SELECT id, name FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("Unable to read category {id}"))?;
    row.map(Category::from)
        .ok_or_else(|| Error::not_found(format!("Category {id} does not exist")))
}

/// Finds the category whose name equals `name` without regard to case.
pub(crate) async fn find_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Category>> {
    let wanted = fold(name);
    Ok(all(conn)
        .await?
        .into_iter()
        .find(|c| fold(&c.name) == wanted))
}

/// Turns category text from a write into a category id, creating the category when the text does
/// not match an existing one. Empty or absent text means no category.
pub(crate) async fn resolve(
    conn: &mut SqliteConnection,
    raw: Option<&str>,
) -> Result<Option<CategoryId>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let existing = all(conn).await?;
    let Some(name) = canonicalize(raw, existing.iter().map(Category::name)) else {
        return Ok(None);
    };
    if let Some(found) = existing.iter().find(|c| c.name == name) {
        return Ok(Some(found.id));
    }
    let created = insert(conn, &name).await?;
    debug!("Created category {} '{}' on write", created.id, created.name);
    Ok(Some(created.id))
}

async fn insert(conn: &mut SqliteConnection, name: &str) -> Result<Category> {
    let id: CategoryId =
        sqlx::query_scalar("INSERT INTO categories (name, created_at) VALUES (?, ?) RETURNING id")
            .bind(name)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("Unable to insert category '{name}'"))?;
    Ok(Category {
        id,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorType;
    use crate::model::{AccountKind, Movement, NewAccount};
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_create_and_list_sorted_without_case() {
        let env = TestEnv::new().await;
        let db = env.db();
        db.create_category("rent").await.unwrap();
        db.create_category("Food").await.unwrap();
        db.create_category("  auto ").await.unwrap();

        let names: Vec<String> = db
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["auto", "Food", "rent"]);
    }

    #[tokio::test]
    async fn test_create_conflicts_without_case() {
        let env = TestEnv::new().await;
        let db = env.db();
        db.create_category("Food").await.unwrap();
        let err = db.create_category("fOOD").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Conflict);
        assert!(err.to_string().contains("Food"));

        db.create_category("ÉPICERIE").await.unwrap();
        let err = db.create_category("épicerie").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Conflict);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let env = TestEnv::new().await;
        let err = env.db().create_category("   ").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
    }

    #[tokio::test]
    async fn test_rename() {
        let env = TestEnv::new().await;
        let db = env.db();
        let food = db.create_category("food").await.unwrap();
        let rent = db.create_category("Rent").await.unwrap();

        let renamed = db.rename_category(food.id(), "Food").await.unwrap();
        assert_eq!(renamed.name(), "Food");

        let err = db.rename_category(rent.id(), "FOOD").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Conflict);
        assert_eq!(db.get_category(rent.id()).await.unwrap().name(), "Rent");

        let err = db
            .rename_category(crate::model::CategoryId::new(999), "X")
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_canonicalize_against_directory() {
        let env = TestEnv::new().await;
        let db = env.db();
        db.create_category("Groceries").await.unwrap();
        assert_eq!(
            db.canonicalize_category(" groceries").await.unwrap().as_deref(),
            Some("Groceries")
        );
        assert_eq!(
            db.canonicalize_category("Books").await.unwrap().as_deref(),
            Some("Books")
        );
        assert_eq!(db.canonicalize_category("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_in_use_then_unused() {
        let env = TestEnv::new().await;
        let db = env.db();
        let checking = db
            .create_account(NewAccount::new("Checking", AccountKind::Standard))
            .await
            .unwrap();
        let tx = db
            .record(
                Movement::expense(checking.id(), env.date(), env.amount("5.00")).category("fuel"),
            )
            .await
            .unwrap();
        let fuel = db.get_category(tx[0].category_id().unwrap()).await.unwrap();
        assert_eq!(fuel.name(), "fuel");

        let err = db.delete_category(fuel.id()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::CategoryInUse);
        assert!(err.is_referential());
        assert!(db.get_category(fuel.id()).await.is_ok());

        db.delete_transaction(tx[0].id()).await.unwrap();
        db.delete_category(fuel.id()).await.unwrap();
        let err = db.get_category(fuel.id()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
    }
}
