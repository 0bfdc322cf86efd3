use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use docusphere_core::domain::document::{Container, Document, DocumentId, DocumentStatus};
use docusphere_core::domain::user::{OrganizationId, UserId};

use super::{
    decode_error, parse_timestamp, unknown_value, write_error, DocumentRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlDocumentRepository {
    pool: DbPool,
}

impl SqlDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &SqliteRow) -> Result<Document, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let title: String = row.try_get("title").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let uploaded_by: String = row.try_get("uploaded_by").map_err(decode_error)?;
    let container_kind: String = row.try_get("container_kind").map_err(decode_error)?;
    let container_id: String = row.try_get("container_id").map_err(decode_error)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode_error)?;
    let manager_id: Option<String> = row.try_get("manager_id").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    let organization_id = OrganizationId(organization_id);
    let container = match (container_kind.as_str(), manager_id) {
        ("space", _) => Container::Space { id: container_id, organization_id },
        ("project", Some(manager_id)) => {
            Container::Project { id: container_id, organization_id, manager_id: UserId(manager_id) }
        }
        ("project", None) => {
            return Err(RepositoryError::Decode(format!(
                "project container `{container_id}` has no manager"
            )))
        }
        (other, _) => return Err(unknown_value("container kind", other)),
    };

    Ok(Document {
        id: DocumentId(id),
        title,
        status: DocumentStatus::parse(&status)
            .ok_or_else(|| unknown_value("document status", &status))?,
        uploaded_by: UserId(uploaded_by),
        container,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl DocumentRepository for SqlDocumentRepository {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, status, uploaded_by, container_kind, container_id,
                    organization_id, manager_id, created_at, updated_at
             FROM documents WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn save(&self, document: Document) -> Result<(), RepositoryError> {
        let manager_id = match &document.container {
            Container::Project { manager_id, .. } => Some(manager_id.0.clone()),
            Container::Space { .. } => None,
        };

        sqlx::query(
            "INSERT INTO documents (id, title, status, uploaded_by, container_kind, container_id,
                                    organization_id, manager_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 status = excluded.status,
                 container_kind = excluded.container_kind,
                 container_id = excluded.container_id,
                 organization_id = excluded.organization_id,
                 manager_id = excluded.manager_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&document.id.0)
        .bind(&document.title)
        .bind(document.status.as_str())
        .bind(&document.uploaded_by.0)
        .bind(document.container.kind())
        .bind(document.container.id())
        .bind(&document.container.organization_id().0)
        .bind(manager_id)
        .bind(document.created_at.to_rfc3339())
        .bind(document.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }
}
