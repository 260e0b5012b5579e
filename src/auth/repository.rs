// Role lookups

use axum::async_trait;
use sqlx::PgPool;

use crate::auth::models::{Role, RoleRecord};
use crate::db::RepositoryError;

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Find the seeded row for a role
    async fn find_by_role(&self, role: Role) -> Result<Option<RoleRecord>, RepositoryError>;
}

/// Role repository for database operations
#[derive(Clone)]
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    /// Create a new PgRoleRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn find_by_role(&self, role: Role) -> Result<Option<RoleRecord>, RepositoryError> {
        let row: Option<(i32, String)> = sqlx::query_as("SELECT id, name FROM roles WHERE name = $1")
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(id, name)| {
            name.parse::<Role>()
                .map(|role| RoleRecord { id, role })
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))
        })
        .transpose()
    }
}
