use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use docusphere_core::audit::AuditEvent;
use docusphere_core::domain::authorization::Authorization;
use docusphere_core::domain::document::{Document, DocumentId};
use docusphere_core::domain::notification::{
    Notification, NotificationId, NotificationType, UserNotificationPreference,
};
use docusphere_core::domain::user::{User, UserId};
use docusphere_core::domain::validation::{ValidationRequest, ValidationRequestId};
use docusphere_core::errors::ApplicationError;

pub mod audit;
pub mod authorization;
pub mod document;
pub mod memory;
pub mod notification;
pub mod user;
pub mod validation;

pub use audit::SqlAuditRepository;
pub use authorization::SqlAuthorizationRepository;
pub use document::SqlDocumentRepository;
pub use memory::{
    InMemoryAuditRepository, InMemoryAuthorizationRepository, InMemoryDocumentRepository,
    InMemoryNotificationRepository, InMemoryPreferenceRepository, InMemoryUserRepository,
    InMemoryValidationRequestRepository,
};
pub use notification::{SqlNotificationRepository, SqlPreferenceRepository};
pub use user::SqlUserRepository;
pub use validation::SqlValidationRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("stale write: {0}")]
    Stale(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(message) | RepositoryError::Stale(message) => {
                Self::Conflict(message)
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Unique-constraint violations become [`RepositoryError::Conflict`].
pub(crate) fn write_error(error: sqlx::Error) -> RepositoryError {
    let unique_violation =
        error.as_database_error().map(|db_error| db_error.is_unique_violation()).unwrap_or(false);
    if unique_violation {
        return RepositoryError::Conflict(error.to_string());
    }
    RepositoryError::Database(error)
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|raw| parse_timestamp(column, &raw)).transpose()
}

pub(crate) fn unknown_value(column: &str, value: &str) -> RepositoryError {
    RepositoryError::Decode(format!("unknown {column} `{value}`"))
}

#[async_trait]
pub trait ValidationRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &ValidationRequestId,
    ) -> Result<Option<ValidationRequest>, RepositoryError>;

    /// Persists the request together with its validations and returns the
    /// stored copy with its bumped `version`. Fails with
    /// [`RepositoryError::Stale`] when the store holds a newer revision than
    /// `request.version`, leaving the stored rows untouched.
    async fn save(&self, request: ValidationRequest)
        -> Result<ValidationRequest, RepositoryError>;

    /// Newest first.
    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError>;

    async fn list_for_requester(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError>;

    /// Every request the user is assigned to as a validator, decided or
    /// not. Newest first.
    async fn list_for_validator(
        &self,
        validator_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError>;

    /// Pending requests on which the validator has not decided yet.
    async fn list_awaiting_validator(
        &self,
        validator_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;
    async fn save(&self, document: Document) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    /// Unknown ids are skipped.
    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Includes revoked grants.
    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<Authorization>, RepositoryError>;
    async fn save(&self, authorization: Authorization) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn find_by_id(&self, id: &NotificationId)
        -> Result<Option<Notification>, RepositoryError>;
    async fn save(&self, notification: Notification) -> Result<(), RepositoryError>;
    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;
    /// Returns how many notifications changed.
    async fn mark_all_read(
        &self,
        user_id: &UserId,
        read_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn find(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<Option<UserNotificationPreference>, RepositoryError>;
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserNotificationPreference>, RepositoryError>;
    async fn save(&self, preference: UserNotificationPreference) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, events: Vec<AuditEvent>) -> Result<(), RepositoryError>;
    /// Oldest first.
    async fn list_for_request(
        &self,
        request_id: &ValidationRequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError>;
}
