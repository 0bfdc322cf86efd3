use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use docusphere_core::domain::user::{OrganizationId, User, UserId};

use super::{decode_error, write_error, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let full_name: String = row.try_get("full_name").map_err(decode_error)?;
    let email: String = row.try_get("email").map_err(decode_error)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode_error)?;
    let admin: bool = row.try_get("admin").map_err(decode_error)?;

    Ok(User {
        id: UserId(id),
        full_name,
        email,
        organization_id: OrganizationId(organization_id),
        admin,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, full_name, email, organization_id, admin FROM users WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, full_name, email, organization_id, admin
             FROM users WHERE id IN ({placeholders}) ORDER BY id"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(&id.0);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, full_name, email, organization_id, admin)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 full_name = excluded.full_name,
                 email = excluded.email,
                 organization_id = excluded.organization_id,
                 admin = excluded.admin",
        )
        .bind(&user.id.0)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.organization_id.0)
        .bind(user.admin)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }
}
