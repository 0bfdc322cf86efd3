use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use docusphere_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use docusphere_core::domain::document::DocumentId;
use docusphere_core::domain::validation::ValidationRequestId;

use super::{decode_error, parse_timestamp, unknown_value, AuditRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditRepository {
    pool: DbPool,
}

impl SqlAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn category_as_str(category: &AuditCategory) -> &'static str {
    match category {
        AuditCategory::Ingress => "ingress",
        AuditCategory::Workflow => "workflow",
        AuditCategory::Notification => "notification",
        AuditCategory::Access => "access",
        AuditCategory::Persistence => "persistence",
        AuditCategory::System => "system",
    }
}

fn parse_category(value: &str) -> Result<AuditCategory, RepositoryError> {
    match value {
        "ingress" => Ok(AuditCategory::Ingress),
        "workflow" => Ok(AuditCategory::Workflow),
        "notification" => Ok(AuditCategory::Notification),
        "access" => Ok(AuditCategory::Access),
        "persistence" => Ok(AuditCategory::Persistence),
        "system" => Ok(AuditCategory::System),
        other => Err(unknown_value("audit category", other)),
    }
}

fn outcome_as_str(outcome: &AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Rejected => "rejected",
        AuditOutcome::Failed => "failed",
    }
}

fn parse_outcome(value: &str) -> Result<AuditOutcome, RepositoryError> {
    match value {
        "success" => Ok(AuditOutcome::Success),
        "rejected" => Ok(AuditOutcome::Rejected),
        "failed" => Ok(AuditOutcome::Failed),
        other => Err(unknown_value("audit outcome", other)),
    }
}

fn row_to_event(row: &SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let request_id: Option<String> = row.try_get("validation_request_id").map_err(decode_error)?;
    let document_id: Option<String> = row.try_get("document_id").map_err(decode_error)?;
    let correlation_id: String = row.try_get("correlation_id").map_err(decode_error)?;
    let event_type: String = row.try_get("event_type").map_err(decode_error)?;
    let category: String = row.try_get("category").map_err(decode_error)?;
    let actor: String = row.try_get("actor").map_err(decode_error)?;
    let outcome: String = row.try_get("outcome").map_err(decode_error)?;
    let metadata_json: String = row.try_get("metadata_json").map_err(decode_error)?;
    let occurred_at: String = row.try_get("occurred_at").map_err(decode_error)?;

    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|error| RepositoryError::Decode(format!("metadata_json: {error}")))?;

    Ok(AuditEvent {
        event_id: id,
        validation_request_id: request_id.map(ValidationRequestId),
        document_id: document_id.map(DocumentId),
        correlation_id,
        event_type,
        category: parse_category(&category)?,
        actor,
        outcome: parse_outcome(&outcome)?,
        metadata,
        occurred_at: parse_timestamp("occurred_at", &occurred_at)?,
    })
}

#[async_trait::async_trait]
impl AuditRepository for SqlAuditRepository {
    async fn append(&self, events: Vec<AuditEvent>) -> Result<(), RepositoryError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for event in &events {
            let metadata_json = serde_json::to_string(&event.metadata)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            sqlx::query(
                "INSERT INTO audit_events (id, validation_request_id, document_id, correlation_id,
                                           event_type, category, actor, outcome, metadata_json,
                                           occurred_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&event.event_id)
            .bind(event.validation_request_id.as_ref().map(|id| id.0.clone()))
            .bind(event.document_id.as_ref().map(|id| id.0.clone()))
            .bind(&event.correlation_id)
            .bind(&event.event_type)
            .bind(category_as_str(&event.category))
            .bind(&event.actor)
            .bind(outcome_as_str(&event.outcome))
            .bind(metadata_json)
            .bind(event.occurred_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn list_for_request(
        &self,
        request_id: &ValidationRequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, validation_request_id, document_id, correlation_id, event_type, category,
                    actor, outcome, metadata_json, occurred_at
             FROM audit_events
             WHERE validation_request_id = ?
             ORDER BY occurred_at ASC, rowid ASC",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use docusphere_core::audit::{AuditCategory, AuditContext, AuditOutcome};
    use docusphere_core::domain::document::DocumentId;
    use docusphere_core::domain::validation::ValidationRequestId;

    use super::SqlAuditRepository;
    use crate::repositories::AuditRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn appended_events_are_listed_per_request() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlAuditRepository::new(pool);

        let context = AuditContext::new(
            Some(ValidationRequestId("VR-1".to_owned())),
            Some(DocumentId("DOC-1".to_owned())),
            "req-1",
            "alice",
        );
        let other =
            AuditContext::new(Some(ValidationRequestId("VR-2".to_owned())), None, "req-2", "bob");
        repo.append(vec![
            context
                .event(
                    "validation.transition_applied",
                    AuditCategory::Workflow,
                    AuditOutcome::Success,
                )
                .with_metadata("to", "approved"),
            other.event(
                "validation.transition_rejected",
                AuditCategory::Workflow,
                AuditOutcome::Rejected,
            ),
        ])
        .await
        .expect("append");

        let events =
            repo.list_for_request(&ValidationRequestId("VR-1".to_owned())).await.expect("list");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Success);
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("approved"));
    }
}
