use docusphere_core::domain::document::DocumentId;
use docusphere_core::domain::validation::{ValidationRequestId, ValidationRequestStatus};
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::{
    DocumentRepository, RepositoryError, SqlDocumentRepository, SqlValidationRequestRepository,
    ValidationRequestRepository,
};

/// One validation request the demo dataset guarantees, and the state it is
/// expected to decode to.
const SEED_SCENARIOS: &[SeedScenario] = &[
    SeedScenario {
        name: "legacy_completed",
        request_id: "vr-handbook-2026",
        document_id: "doc-handbook",
        expected_status: ValidationRequestStatus::Approved,
        expected_validators: 1,
        expected_approvals: 1,
        description: "Request stored as `completed` by an older deployment",
    },
    SeedScenario {
        name: "awaiting_quorum",
        request_id: "vr-site-plan-c",
        document_id: "doc-site-plan",
        expected_status: ValidationRequestStatus::Pending,
        expected_validators: 2,
        expected_approvals: 1,
        description: "Project document one approval short of its quorum",
    },
];

const SEED_USER_IDS: &[&str] =
    &["user-alice", "user-bruno", "user-chloe", "user-dmitri", "user-admin"];

const SEED_DOCUMENT_IDS: &[&str] = &["doc-handbook", "doc-site-plan"];

const SEED_AUTHORIZATION_IDS: &[&str] =
    &["auth-handbook-bruno", "auth-site-bruno", "auth-site-chloe"];

/// Demo dataset: a handful of users in one organization, a space document
/// with a finished review and a project document mid-review.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let scenarios_seeded = SEED_SCENARIOS
            .iter()
            .map(|scenario| ScenarioSeedInfo {
                name: scenario.name,
                request_id: scenario.request_id,
                description: scenario.description,
            })
            .collect();

        Ok(SeedResult { scenarios_seeded })
    }

    /// Reads the seeded rows back through the repositories, so a decode
    /// regression fails verification rather than only a raw row count.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let user_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM users WHERE id IN {}",
            sql_array_from_ids(SEED_USER_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("users", user_count == SEED_USER_IDS.len() as i64));

        let grant_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM authorizations WHERE id IN {} AND revoked_at IS NULL",
            sql_array_from_ids(SEED_AUTHORIZATION_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("authorizations", grant_count == SEED_AUTHORIZATION_IDS.len() as i64));

        let documents = SqlDocumentRepository::new(pool.clone());
        for document_id in SEED_DOCUMENT_IDS {
            let found = documents.find_by_id(&DocumentId((*document_id).to_owned())).await?;
            checks.push((*document_id, found.is_some()));
        }

        let requests = SqlValidationRequestRepository::new(pool.clone());
        for scenario in SEED_SCENARIOS {
            let request =
                requests.find_by_id(&ValidationRequestId(scenario.request_id.to_owned())).await?;
            let matches = request.is_some_and(|request| {
                let progress = request.validation_progress();
                request.document_id.0 == scenario.document_id
                    && request.status == scenario.expected_status
                    && progress.total_validators == scenario.expected_validators
                    && progress.approved == scenario.expected_approvals
            });
            checks.push((scenario.name, matches));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let documents = sql_array_from_ids(SEED_DOCUMENT_IDS);
        let users = sql_array_from_ids(SEED_USER_IDS);

        let mut tx = pool.begin().await?;
        sqlx::query(&format!(
            "DELETE FROM document_validations WHERE validation_request_id IN
                 (SELECT id FROM validation_requests WHERE document_id IN {documents})"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM validation_requests WHERE document_id IN {documents}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM authorizations WHERE document_id IN {documents}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM documents WHERE id IN {documents}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM notifications WHERE user_id IN {users}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "DELETE FROM user_notification_preferences WHERE user_id IN {users}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM users WHERE id IN {users}")).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedScenario {
    name: &'static str,
    request_id: &'static str,
    document_id: &'static str,
    expected_status: ValidationRequestStatus,
    expected_validators: usize,
    expected_approvals: usize,
    description: &'static str,
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub scenarios_seeded: Vec<ScenarioSeedInfo>,
}

#[derive(Debug)]
pub struct ScenarioSeedInfo {
    pub name: &'static str,
    pub request_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
