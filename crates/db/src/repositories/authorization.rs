use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use docusphere_core::domain::authorization::{Authorization, AuthorizationId, PermissionLevel};
use docusphere_core::domain::document::DocumentId;
use docusphere_core::domain::user::UserId;

use super::{
    decode_error, parse_optional_timestamp, parse_timestamp, unknown_value, write_error,
    AuthorizationRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlAuthorizationRepository {
    pool: DbPool,
}

impl SqlAuthorizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_authorization(row: &SqliteRow) -> Result<Authorization, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let document_id: String = row.try_get("document_id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let permission_level: String = row.try_get("permission_level").map_err(decode_error)?;
    let granted_by: String = row.try_get("granted_by").map_err(decode_error)?;
    let granted_at: String = row.try_get("granted_at").map_err(decode_error)?;
    let comment: Option<String> = row.try_get("comment").map_err(decode_error)?;
    let revoked_by: Option<String> = row.try_get("revoked_by").map_err(decode_error)?;
    let revoked_at: Option<String> = row.try_get("revoked_at").map_err(decode_error)?;

    Ok(Authorization {
        id: AuthorizationId(id),
        document_id: DocumentId(document_id),
        user_id: UserId(user_id),
        permission_level: PermissionLevel::parse(&permission_level)
            .ok_or_else(|| unknown_value("permission level", &permission_level))?,
        granted_by: UserId(granted_by),
        granted_at: parse_timestamp("granted_at", &granted_at)?,
        comment,
        revoked_by: revoked_by.map(UserId),
        revoked_at: parse_optional_timestamp("revoked_at", revoked_at)?,
    })
}

#[async_trait::async_trait]
impl AuthorizationRepository for SqlAuthorizationRepository {
    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<Authorization>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, document_id, user_id, permission_level, granted_by, granted_at,
                    comment, revoked_by, revoked_at
             FROM authorizations WHERE document_id = ? ORDER BY granted_at ASC, id ASC",
        )
        .bind(&document_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_authorization).collect()
    }

    async fn save(&self, authorization: Authorization) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO authorizations (id, document_id, user_id, permission_level, granted_by,
                                         granted_at, comment, revoked_by, revoked_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 permission_level = excluded.permission_level,
                 comment = excluded.comment,
                 revoked_by = excluded.revoked_by,
                 revoked_at = excluded.revoked_at",
        )
        .bind(&authorization.id.0)
        .bind(&authorization.document_id.0)
        .bind(&authorization.user_id.0)
        .bind(authorization.permission_level.as_str())
        .bind(&authorization.granted_by.0)
        .bind(authorization.granted_at.to_rfc3339())
        .bind(&authorization.comment)
        .bind(authorization.revoked_by.as_ref().map(|user_id| user_id.0.clone()))
        .bind(authorization.revoked_at.map(|timestamp| timestamp.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use docusphere_core::domain::authorization::{
        Authorization, AuthorizationId, PermissionLevel,
    };
    use docusphere_core::domain::document::DocumentId;
    use docusphere_core::domain::user::UserId;

    use super::SqlAuthorizationRepository;
    use crate::fixtures::test_support::{insert_document, insert_user};
    use crate::repositories::AuthorizationRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn revocation_is_persisted() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        insert_user(&pool, "owner").await;
        insert_user(&pool, "checker").await;
        insert_document(&pool, "DOC-1", "owner").await;
        let repo = SqlAuthorizationRepository::new(pool);

        let mut grant = Authorization {
            id: AuthorizationId("AUTH-1".to_owned()),
            document_id: DocumentId("DOC-1".to_owned()),
            user_id: UserId("checker".to_owned()),
            permission_level: PermissionLevel::Validate,
            granted_by: UserId("owner".to_owned()),
            granted_at: Utc::now(),
            comment: Some("Finance review".to_owned()),
            revoked_by: None,
            revoked_at: None,
        };
        repo.save(grant.clone()).await.expect("save grant");

        assert!(grant.revoke(UserId("owner".to_owned()), Utc::now()));
        repo.save(grant).await.expect("save revocation");

        let grants =
            repo.list_for_document(&DocumentId("DOC-1".to_owned())).await.expect("list grants");
        assert_eq!(grants.len(), 1);
        assert!(!grants[0].is_active());
        assert_eq!(grants[0].revoked_by, Some(UserId("owner".to_owned())));
    }
}
