// Persistence for users and their image file records

use axum::async_trait;
use sqlx::PgPool;

use crate::db::RepositoryError;
use crate::users::models::{FileRecord, NewUser, User, UserRow};

/// Columns selected for every user read, with the role name joined in
const USER_COLUMNS: &str = "u.id, u.name, u.email, u.password_hash, u.age, u.image_name, \
     u.role_id, r.name AS role_name, u.created_at, u.updated_at";

const FILE_COLUMNS: &str = "id, file_name, user_id, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Insert the user and its file record atomically
    async fn create_with_file(
        &self,
        user: NewUser,
        file_name: &str,
    ) -> Result<(User, FileRecord), RepositoryError>;

    async fn find_all(&self) -> Result<Vec<User>, RepositoryError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Persist name, age and image name; `None` when the row is gone
    async fn update(&self, user: &User) -> Result<Option<User>, RepositoryError>;

    /// Point the user's file record at `file_name` and persist the user atomically
    ///
    /// Nothing is written when the user row is gone (`None`).
    async fn update_with_file(
        &self,
        user: &User,
        file_name: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Returns whether a row was deleted
    async fn delete(&self, id: i32) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn find_by_user_id(&self, user_id: i32) -> Result<Option<FileRecord>, RepositoryError>;
    /// Returns the number of removed records
    async fn delete_by_user_id(&self, user_id: i32) -> Result<u64, RepositoryError>;
}

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn update_sql() -> String {
        format!(
            "WITH u AS (
                UPDATE users SET name = $1, age = $2, image_name = $3, updated_at = NOW()
                WHERE id = $4
                RETURNING *
            )
            SELECT {} FROM u JOIN roles r ON r.id = u.role_id",
            USER_COLUMNS
        )
    }

    fn insert_sql() -> String {
        format!(
            "WITH u AS (
                INSERT INTO users (name, email, password_hash, age, image_name, role_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {} FROM u JOIN roles r ON r.id = u.role_id",
            USER_COLUMNS
        )
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&Self::insert_sql())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.age)
            .bind(&user.image_name)
            .bind(user.role_id)
            .fetch_one(&self.pool)
            .await?;

        User::try_from(row)
    }

    async fn create_with_file(
        &self,
        user: NewUser,
        file_name: &str,
    ) -> Result<(User, FileRecord), RepositoryError> {
        // Rolled back on drop if either insert fails
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&Self::insert_sql())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.age)
            .bind(&user.image_name)
            .bind(user.role_id)
            .fetch_one(&mut *tx)
            .await?;

        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "INSERT INTO files (file_name, user_id) VALUES ($1, $2) RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(file_name)
        .bind(row.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((User::try_from(row)?, file))
    }

    async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users u JOIN roles r ON r.id = u.role_id ORDER BY u.id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users u JOIN roles r ON r.id = u.role_id WHERE LOWER(u.email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn update(&self, user: &User) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&Self::update_sql())
            .bind(&user.name)
            .bind(user.age)
            .bind(&user.image_name)
            .bind(user.id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn update_with_file(
        &self,
        user: &User,
        file_name: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the user row so the file upsert cannot race a delete
        let exists: Option<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO files (file_name, user_id) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET file_name = EXCLUDED.file_name, updated_at = NOW()",
        )
        .bind(file_name)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, UserRow>(&Self::update_sql())
            .bind(&user.name)
            .bind(user.age)
            .bind(&user.image_name)
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        tx.commit().await?;

        User::try_from(row).map(Some)
    }

    async fn delete(&self, id: i32) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// PostgreSQL-backed file record repository
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn find_by_user_id(&self, user_id: i32) -> Result<Option<FileRecord>, RepositoryError> {
        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE user_id = $1",
            FILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file)
    }

    async fn delete_by_user_id(&self, user_id: i32) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM files WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
