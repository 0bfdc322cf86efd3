use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use docusphere_core::domain::document::DocumentId;
use docusphere_core::domain::user::UserId;
use docusphere_core::domain::validation::{
    DocumentValidation, DocumentValidationId, DocumentValidationStatus, ValidationRequest,
    ValidationRequestId, ValidationRequestStatus,
};

use super::{
    decode_error, parse_optional_timestamp, parse_timestamp, unknown_value, write_error,
    RepositoryError, ValidationRequestRepository,
};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, document_id, requester_id, min_validations, status,
    description, due_date, created_at, updated_at, completed_at, version";

pub struct SqlValidationRequestRepository {
    pool: DbPool,
}

impl SqlValidationRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_requests(
        &self,
        sql: &str,
        key: &str,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let rows = sqlx::query(sql).bind(key).fetch_all(&self.pool).await?;
        let mut requests = rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()?;
        self.attach_validations(&mut requests).await?;
        Ok(requests)
    }

    async fn attach_validations(
        &self,
        requests: &mut [ValidationRequest],
    ) -> Result<(), RepositoryError> {
        if requests.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; requests.len()].join(", ");
        let sql = format!(
            "SELECT id, validation_request_id, validator_id, status, comment, validated_at,
                    created_at
             FROM document_validations
             WHERE validation_request_id IN ({placeholders})
             ORDER BY created_at ASC, id ASC"
        );
        let mut query = sqlx::query(&sql);
        for request in requests.iter() {
            query = query.bind(&request.id.0);
        }

        let mut by_request: HashMap<String, Vec<DocumentValidation>> = HashMap::new();
        for row in query.fetch_all(&self.pool).await? {
            let validation = row_to_validation(&row)?;
            by_request
                .entry(validation.validation_request_id.0.clone())
                .or_default()
                .push(validation);
        }
        for request in requests.iter_mut() {
            request.validations = by_request.remove(&request.id.0).unwrap_or_default();
        }
        Ok(())
    }
}

fn row_to_request(row: &SqliteRow) -> Result<ValidationRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let document_id: String = row.try_get("document_id").map_err(decode_error)?;
    let requester_id: String = row.try_get("requester_id").map_err(decode_error)?;
    let min_validations: i64 = row.try_get("min_validations").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let description: Option<String> = row.try_get("description").map_err(decode_error)?;
    let due_date: Option<String> = row.try_get("due_date").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;
    let completed_at: Option<String> = row.try_get("completed_at").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;

    Ok(ValidationRequest {
        id: ValidationRequestId(id),
        document_id: DocumentId(document_id),
        requester_id: UserId(requester_id),
        min_validations: u32::try_from(min_validations)
            .map_err(|_| unknown_value("min_validations", &min_validations.to_string()))?,
        status: ValidationRequestStatus::parse(&status)
            .ok_or_else(|| unknown_value("validation request status", &status))?,
        description,
        due_date: parse_optional_timestamp("due_date", due_date)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
        completed_at: parse_optional_timestamp("completed_at", completed_at)?,
        version: u32::try_from(version)
            .map_err(|_| unknown_value("version", &version.to_string()))?,
        validations: Vec::new(),
    })
}

fn row_to_validation(row: &SqliteRow) -> Result<DocumentValidation, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let request_id: String = row.try_get("validation_request_id").map_err(decode_error)?;
    let validator_id: String = row.try_get("validator_id").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let comment: Option<String> = row.try_get("comment").map_err(decode_error)?;
    let validated_at: Option<String> = row.try_get("validated_at").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(DocumentValidation {
        id: DocumentValidationId(id),
        validation_request_id: ValidationRequestId(request_id),
        validator_id: UserId(validator_id),
        status: DocumentValidationStatus::parse(&status)
            .ok_or_else(|| unknown_value("document validation status", &status))?,
        comment,
        validated_at: parse_optional_timestamp("validated_at", validated_at)?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl ValidationRequestRepository for SqlValidationRequestRepository {
    async fn find_by_id(
        &self,
        id: &ValidationRequestId,
    ) -> Result<Option<ValidationRequest>, RepositoryError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM validation_requests WHERE id = ?");
        Ok(self.fetch_requests(&sql, &id.0).await?.into_iter().next())
    }

    async fn save(
        &self,
        mut request: ValidationRequest,
    ) -> Result<ValidationRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // The guarded update takes the write lock first, so concurrent saves
        // of the same request serialize here and the loser sees a moved version.
        let updated = sqlx::query(
            "UPDATE validation_requests
             SET min_validations = ?, status = ?, description = ?, due_date = ?,
                 updated_at = ?, completed_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(i64::from(request.min_validations))
        .bind(request.status.as_str())
        .bind(&request.description)
        .bind(request.due_date.map(|timestamp| timestamp.to_rfc3339()))
        .bind(request.updated_at.to_rfc3339())
        .bind(request.completed_at.map(|timestamp| timestamp.to_rfc3339()))
        .bind(&request.id.0)
        .bind(i64::from(request.version))
        .execute(&mut *tx)
        .await
        .map_err(write_error)?
        .rows_affected();

        if updated == 1 {
            request.version += 1;
        } else {
            sqlx::query(
                "INSERT INTO validation_requests (id, document_id, requester_id, min_validations,
                                                  status, description, due_date, created_at,
                                                  updated_at, completed_at, version)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&request.id.0)
            .bind(&request.document_id.0)
            .bind(&request.requester_id.0)
            .bind(i64::from(request.min_validations))
            .bind(request.status.as_str())
            .bind(&request.description)
            .bind(request.due_date.map(|timestamp| timestamp.to_rfc3339()))
            .bind(request.created_at.to_rfc3339())
            .bind(request.updated_at.to_rfc3339())
            .bind(request.completed_at.map(|timestamp| timestamp.to_rfc3339()))
            .bind(i64::from(request.version))
            .execute(&mut *tx)
            .await
            .map_err(|error| match write_error(error) {
                RepositoryError::Conflict(_) => RepositoryError::Stale(format!(
                    "validation request `{}` changed since version {}",
                    request.id, request.version
                )),
                other => other,
            })?;
        }

        for validation in &request.validations {
            sqlx::query(
                "INSERT INTO document_validations (id, validation_request_id, validator_id,
                                                   status, comment, validated_at, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     status = excluded.status,
                     comment = excluded.comment,
                     validated_at = excluded.validated_at",
            )
            .bind(&validation.id.0)
            .bind(&validation.validation_request_id.0)
            .bind(&validation.validator_id.0)
            .bind(validation.status.as_str())
            .bind(&validation.comment)
            .bind(validation.validated_at.map(|timestamp| timestamp.to_rfc3339()))
            .bind(validation.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(write_error)?;
        }

        tx.commit().await?;
        Ok(request)
    }

    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM validation_requests
             WHERE document_id = ? ORDER BY created_at DESC, id DESC"
        );
        self.fetch_requests(&sql, &document_id.0).await
    }

    async fn list_for_requester(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM validation_requests
             WHERE requester_id = ? ORDER BY created_at DESC, id DESC"
        );
        self.fetch_requests(&sql, &requester_id.0).await
    }

    async fn list_for_validator(
        &self,
        validator_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM validation_requests
             WHERE id IN (SELECT validation_request_id FROM document_validations
                          WHERE validator_id = ?)
             ORDER BY created_at DESC, id DESC"
        );
        self.fetch_requests(&sql, &validator_id.0).await
    }

    async fn list_awaiting_validator(
        &self,
        validator_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM validation_requests
             WHERE status = 'pending'
               AND id IN (SELECT validation_request_id FROM document_validations
                          WHERE validator_id = ? AND status = 'pending')
             ORDER BY created_at DESC, id DESC"
        );
        self.fetch_requests(&sql, &validator_id.0).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use docusphere_core::domain::document::DocumentId;
    use docusphere_core::domain::user::UserId;
    use docusphere_core::domain::validation::{
        DocumentValidation, DocumentValidationId, DocumentValidationStatus, ValidationRequest,
        ValidationRequestId, ValidationRequestStatus,
    };

    use super::SqlValidationRequestRepository;
    use crate::fixtures::test_support::{insert_document, insert_user};
    use crate::repositories::{RepositoryError, ValidationRequestRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        for user in ["requester", "alice", "bob"] {
            insert_user(&pool, user).await;
        }
        insert_document(&pool, "DOC-1", "requester").await;
        pool
    }

    fn validation(request_id: &str, id: &str, validator: &str) -> DocumentValidation {
        DocumentValidation {
            id: DocumentValidationId(id.to_owned()),
            validation_request_id: ValidationRequestId(request_id.to_owned()),
            validator_id: UserId(validator.to_owned()),
            status: DocumentValidationStatus::Pending,
            comment: None,
            validated_at: None,
            created_at: Utc::now(),
        }
    }

    fn sample_request(id: &str) -> ValidationRequest {
        let now = Utc::now();
        ValidationRequest {
            id: ValidationRequestId(id.to_owned()),
            document_id: DocumentId("DOC-1".to_owned()),
            requester_id: UserId("requester".to_owned()),
            min_validations: 2,
            status: ValidationRequestStatus::Pending,
            description: Some("Quarterly budget".to_owned()),
            due_date: Some(now + Duration::days(3)),
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 0,
            validations: vec![
                validation(id, &format!("{id}-A"), "alice"),
                validation(id, &format!("{id}-B"), "bob"),
            ],
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id_with_validations() {
        let pool = setup().await;
        let repo = SqlValidationRequestRepository::new(pool);

        repo.save(sample_request("VR-1")).await.expect("save");
        let found = repo
            .find_by_id(&ValidationRequestId("VR-1".to_owned()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.min_validations, 2);
        assert_eq!(found.description.as_deref(), Some("Quarterly budget"));
        assert_eq!(found.validations.len(), 2);
        assert!(found.due_date.is_some());
    }

    #[tokio::test]
    async fn save_updates_decisions_in_place() {
        let pool = setup().await;
        let repo = SqlValidationRequestRepository::new(pool);

        let mut request = sample_request("VR-1");
        repo.save(request.clone()).await.expect("save");

        let now = Utc::now();
        request.validations[0].status = DocumentValidationStatus::Rejected;
        request.validations[0].comment = Some("Wrong totals".to_owned());
        request.validations[0].validated_at = Some(now);
        request.status = ValidationRequestStatus::Rejected;
        request.completed_at = Some(now);
        repo.save(request).await.expect("upsert");

        let found = repo
            .find_by_id(&ValidationRequestId("VR-1".to_owned()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.status, ValidationRequestStatus::Rejected);
        assert!(found.completed_at.is_some());
        let alice = found.validation_for(&UserId("alice".to_owned())).expect("alice");
        assert_eq!(alice.status, DocumentValidationStatus::Rejected);
        assert_eq!(alice.comment.as_deref(), Some("Wrong totals"));
    }

    #[tokio::test]
    async fn decisions_from_outdated_copies_do_not_overwrite_each_other() {
        let pool = setup().await;
        let repo = SqlValidationRequestRepository::new(pool);
        repo.save(sample_request("VR-1")).await.expect("save");

        let id = ValidationRequestId("VR-1".to_owned());
        let mut alice_copy = repo.find_by_id(&id).await.expect("find").expect("should exist");
        let mut bob_copy = alice_copy.clone();

        let now = Utc::now();
        alice_copy.validations[0].status = DocumentValidationStatus::Rejected;
        alice_copy.validations[0].comment = Some("Wrong totals".to_owned());
        alice_copy.validations[0].validated_at = Some(now);
        alice_copy.status = ValidationRequestStatus::Rejected;
        alice_copy.completed_at = Some(now);
        let saved = repo.save(alice_copy).await.expect("first writer");
        assert_eq!(saved.version, 1);

        bob_copy.validations[1].status = DocumentValidationStatus::Approved;
        bob_copy.validations[1].validated_at = Some(now);
        bob_copy.status = ValidationRequestStatus::Approved;
        let error = repo.save(bob_copy).await.expect_err("outdated copy");
        assert!(matches!(error, RepositoryError::Stale(_)));

        let found = repo.find_by_id(&id).await.expect("find").expect("should exist");
        assert_eq!(found.status, ValidationRequestStatus::Rejected);
        assert_eq!(found.version, 1);
        let alice = found.validation_for(&UserId("alice".to_owned())).expect("alice");
        assert_eq!(alice.status, DocumentValidationStatus::Rejected);
        let bob = found.validation_for(&UserId("bob".to_owned())).expect("bob");
        assert_eq!(bob.status, DocumentValidationStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_validator_row_is_a_conflict() {
        let pool = setup().await;
        let repo = SqlValidationRequestRepository::new(pool);

        let mut request = sample_request("VR-1");
        repo.save(request.clone()).await.expect("save");

        request.validations.push(validation("VR-1", "VR-1-A2", "alice"));
        let error = repo.save(request).await.expect_err("unique violation");
        assert!(matches!(error, RepositoryError::Conflict(_)));
        let found = repo
            .find_by_id(&ValidationRequestId("VR-1".to_owned()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.version, 0, "failed save must not bump the version");
        assert_eq!(found.validations.len(), 2, "failed save must not leave partial rows");
    }

    #[tokio::test]
    async fn legacy_completed_rows_decode_as_approved() {
        let pool = setup().await;
        let repo = SqlValidationRequestRepository::new(pool.clone());
        repo.save(sample_request("VR-1")).await.expect("save");

        sqlx::query("UPDATE validation_requests SET status = 'completed' WHERE id = 'VR-1'")
            .execute(&pool)
            .await
            .expect("write legacy status");

        let found = repo
            .find_by_id(&ValidationRequestId("VR-1".to_owned()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.status, ValidationRequestStatus::Approved);
    }

    #[tokio::test]
    async fn listing_queries_filter_by_role() {
        let pool = setup().await;
        let repo = SqlValidationRequestRepository::new(pool);

        let mut decided = sample_request("VR-1");
        decided.created_at = Utc::now() - Duration::hours(2);
        decided.validations[0].status = DocumentValidationStatus::Approved;
        decided.validations[0].validated_at = Some(Utc::now());
        repo.save(decided).await.expect("save decided");
        repo.save(sample_request("VR-2")).await.expect("save fresh");

        let history =
            repo.list_for_document(&DocumentId("DOC-1".to_owned())).await.expect("history");
        assert_eq!(history[0].id.0, "VR-2");
        assert_eq!(history.len(), 2);

        let alice = repo.list_awaiting_validator(&UserId("alice".to_owned())).await.expect("alice");
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].id.0, "VR-2");

        let bob = repo.list_awaiting_validator(&UserId("bob".to_owned())).await.expect("bob");
        assert_eq!(bob.len(), 2);

        let requested =
            repo.list_for_requester(&UserId("requester".to_owned())).await.expect("requester");
        assert_eq!(requested.len(), 2);

        let assigned =
            repo.list_for_validator(&UserId("alice".to_owned())).await.expect("assigned");
        assert_eq!(
            assigned.iter().map(|request| request.id.0.as_str()).collect::<Vec<_>>(),
            vec!["VR-2", "VR-1"]
        );
        assert!(repo
            .list_for_validator(&UserId("requester".to_owned()))
            .await
            .expect("not a validator")
            .is_empty());
    }
}
