//! User repository for database operations.

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

use super::models::User;
use crate::auth::Role;

const USER_COLUMNS: &str = "id, email, password_hash, display_name, phone, role, is_active, \
                            created_at, updated_at, last_login_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn generate_user_id() -> String {
        format!("usr_{}", nanoid::nanoid!(12))
    }

    /// Insert a user on an open connection, typically inside a transaction.
    ///
    /// `password_hash` must already be hashed.
    #[instrument(skip(conn, password_hash))]
    pub async fn insert(
        conn: &mut SqliteConnection,
        id: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
        role: Role,
    ) -> Result<()> {
        debug!("Creating user: {} ({})", email, id);

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, display_name, role)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(role)
        .execute(&mut *conn)
        .await
        .context("Failed to insert user")?;

        Ok(())
    }

    /// Create a user outside of any other write.
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        display_name: &str,
        role: Role,
    ) -> Result<User> {
        let id = Self::generate_user_id();
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        Self::insert(&mut conn, &id, email, password_hash, display_name, role).await?;
        drop(conn);

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        Ok(user)
    }

    /// Get a user by email (case-insensitive).
    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;

        Ok(user)
    }

    /// Whether `email` is free, ignoring the account `except_id`.
    pub async fn is_email_available(&self, email: &str, except_id: Option<&str>) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE email = ? COLLATE NOCASE AND id IS NOT ?",
        )
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check email availability")?;

        Ok(count.0 == 0)
    }

    /// Update email and/or phone. Absent fields are left unchanged.
    #[instrument(skip(self))]
    pub async fn update_contact(
        &self,
        id: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = COALESCE(?, email),
                phone = COALESCE(?, phone),
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(email)
        .bind(phone)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update contact info")?;

        Ok(result.rows_affected() > 0)
    }

    /// Update last login timestamp.
    pub async fn update_last_login(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update last login")?;
        Ok(())
    }

    /// List users holding any role other than `patient`.
    #[instrument(skip(self))]
    pub async fn list_staff(&self) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role != ? ORDER BY created_at, email"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(Role::Patient)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list staff")?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());

        let user = repo
            .create("ada@example.com", "hash", "Ada", Role::Patient)
            .await
            .unwrap();
        assert!(user.id.starts_with("usr_"));
        assert_eq!(user.role, Role::Patient);
        assert!(user.is_active);

        let fetched = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "ada@example.com");

        let by_email = repo.get_by_email("ADA@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn test_email_availability_excludes_self() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        let user = repo
            .create("ada@example.com", "hash", "Ada", Role::Patient)
            .await
            .unwrap();

        assert!(!repo.is_email_available("ada@example.com", None).await.unwrap());
        assert!(
            repo.is_email_available("ada@example.com", Some(&user.id))
                .await
                .unwrap()
        );
        assert!(repo.is_email_available("bob@example.com", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_contact_keeps_absent_fields() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        let user = repo
            .create("ada@example.com", "hash", "Ada", Role::Patient)
            .await
            .unwrap();

        assert!(
            repo.update_contact(&user.id, None, Some("5551234567"))
                .await
                .unwrap()
        );
        let updated = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(updated.email, "ada@example.com");
        assert_eq!(updated.phone.as_deref(), Some("5551234567"));

        assert!(!repo.update_contact("usr_missing", None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_staff() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        repo.create("ada@example.com", "hash", "Ada", Role::Patient)
            .await
            .unwrap();
        repo.create("nurse@example.com", "hash", "Nurse", Role::Clinician)
            .await
            .unwrap();

        let staff = repo.list_staff().await.unwrap();
        assert_eq!(staff.len(), 1);
        assert_eq!(staff[0].role, Role::Clinician);
    }
}
