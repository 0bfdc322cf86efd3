use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use docusphere_core::audit::AuditEvent;
use docusphere_core::domain::authorization::Authorization;
use docusphere_core::domain::document::{Document, DocumentId};
use docusphere_core::domain::notification::{
    Notification, NotificationId, NotificationType, UserNotificationPreference,
};
use docusphere_core::domain::user::{User, UserId};
use docusphere_core::domain::validation::{ValidationRequest, ValidationRequestId};

use super::{
    AuditRepository, AuthorizationRepository, DocumentRepository, NotificationRepository,
    PreferenceRepository, RepositoryError, UserRepository, ValidationRequestRepository,
};

#[derive(Default)]
pub struct InMemoryValidationRequestRepository {
    requests: RwLock<HashMap<String, ValidationRequest>>,
}

fn newest_first(mut requests: Vec<ValidationRequest>) -> Vec<ValidationRequest> {
    requests.sort_by(|left, right| {
        right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
    });
    requests
}

#[async_trait::async_trait]
impl ValidationRequestRepository for InMemoryValidationRequestRepository {
    async fn find_by_id(
        &self,
        id: &ValidationRequestId,
    ) -> Result<Option<ValidationRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(
        &self,
        mut request: ValidationRequest,
    ) -> Result<ValidationRequest, RepositoryError> {
        let mut requests = self.requests.write().await;
        if let Some(stored) = requests.get(&request.id.0) {
            if stored.version != request.version {
                return Err(RepositoryError::Stale(format!(
                    "validation request `{}` changed since version {}",
                    request.id, request.version
                )));
            }
            request.version += 1;
        }
        requests.insert(request.id.0.clone(), request.clone());
        Ok(request)
    }

    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(newest_first(
            requests
                .values()
                .filter(|request| &request.document_id == document_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_requester(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(newest_first(
            requests
                .values()
                .filter(|request| &request.requester_id == requester_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_validator(
        &self,
        validator_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(newest_first(
            requests
                .values()
                .filter(|request| request.validation_for(validator_id).is_some())
                .cloned()
                .collect(),
        ))
    }

    async fn list_awaiting_validator(
        &self,
        validator_id: &UserId,
    ) -> Result<Vec<ValidationRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(newest_first(
            requests
                .values()
                .filter(|request| request.can_be_validated_by(validator_id))
                .cloned()
                .collect(),
        ))
    }
}

#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: RwLock<HashMap<String, Document>>,
}

#[async_trait::async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let documents = self.documents.read().await;
        Ok(documents.get(&id.0).cloned())
    }

    async fn save(&self, document: Document) -> Result<(), RepositoryError> {
        let mut documents = self.documents.write().await;
        documents.insert(document.id.0.clone(), document);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn find_many(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(&id.0).cloned()).collect())
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.id.0.clone(), user);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuthorizationRepository {
    authorizations: RwLock<HashMap<String, Authorization>>,
}

#[async_trait::async_trait]
impl AuthorizationRepository for InMemoryAuthorizationRepository {
    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<Authorization>, RepositoryError> {
        let authorizations = self.authorizations.read().await;
        Ok(authorizations
            .values()
            .filter(|authorization| &authorization.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn save(&self, authorization: Authorization) -> Result<(), RepositoryError> {
        let mut authorizations = self.authorizations.write().await;
        authorizations.insert(authorization.id.0.clone(), authorization);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<HashMap<String, Notification>>,
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        let notifications = self.notifications.read().await;
        Ok(notifications.get(&id.0).cloned())
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.write().await;
        notifications.insert(notification.id.0.clone(), notification);
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = self.notifications.read().await;
        let mut matching: Vec<_> = notifications
            .values()
            .filter(|notification| &notification.user_id == user_id)
            .filter(|notification| !unread_only || !notification.is_read())
            .cloned()
            .collect();
        matching.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
        });
        Ok(matching)
    }

    async fn mark_all_read(
        &self,
        user_id: &UserId,
        read_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut notifications = self.notifications.write().await;
        let changed = notifications
            .values_mut()
            .filter(|notification| &notification.user_id == user_id)
            .map(|notification| notification.mark_as_read(read_at))
            .filter(|changed| *changed)
            .count();
        Ok(changed as u64)
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceRepository {
    preferences: RwLock<HashMap<(String, NotificationType), UserNotificationPreference>>,
}

#[async_trait::async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn find(
        &self,
        user_id: &UserId,
        notification_type: NotificationType,
    ) -> Result<Option<UserNotificationPreference>, RepositoryError> {
        let preferences = self.preferences.read().await;
        Ok(preferences.get(&(user_id.0.clone(), notification_type)).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserNotificationPreference>, RepositoryError> {
        let preferences = self.preferences.read().await;
        let mut matching: Vec<_> = preferences
            .values()
            .filter(|preference| &preference.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by_key(|preference| preference.notification_type);
        Ok(matching)
    }

    async fn save(&self, preference: UserNotificationPreference) -> Result<(), RepositoryError> {
        let mut preferences = self.preferences.write().await;
        let key = (preference.user_id.0.clone(), preference.notification_type);
        preferences.insert(key, preference);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepository {
    events: RwLock<Vec<AuditEvent>>,
}

#[async_trait::async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(&self, events: Vec<AuditEvent>) -> Result<(), RepositoryError> {
        let mut stored = self.events.write().await;
        stored.extend(events);
        Ok(())
    }

    async fn list_for_request(
        &self,
        request_id: &ValidationRequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let stored = self.events.read().await;
        Ok(stored
            .iter()
            .filter(|event| event.validation_request_id.as_ref() == Some(request_id))
            .cloned()
            .collect())
    }
}
