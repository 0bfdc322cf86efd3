//! Application service for the document validation workflow.
//!
//! Every operation follows the same shape: load the aggregate and the
//! document it belongs to, check access, apply one transition through the
//! [`ValidationEngine`], persist, then turn the resulting events into
//! notifications. Audit events gathered along the way are written to the
//! process log and the audit store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use docusphere_core::access::DocumentAccess;
use docusphere_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    TracingAuditSink,
};
use docusphere_core::config::WorkflowConfig;
use docusphere_core::domain::authorization::Authorization;
use docusphere_core::domain::document::{Document, DocumentId};
use docusphere_core::domain::notification::{
    Notification, NotificationId, NotificationType, UserNotificationPreference,
};
use docusphere_core::domain::user::{User, UserId};
use docusphere_core::domain::validation::{
    ValidationProgress, ValidationRequest, ValidationRequestId,
};
use docusphere_core::errors::ApplicationError;
use docusphere_core::history::{status_label, ValidationHistory};
use docusphere_core::notifications::{DispatchContext, NotificationDispatcher};
use docusphere_core::workflow::{
    CompletionPolicy, NewValidationRequest, RejectionPolicy, ValidationEngine, WorkflowCommand,
    WorkflowContext, WorkflowError, WorkflowEvent, WorkflowOutcome,
};

use crate::repositories::{
    AuditRepository, AuthorizationRepository, DocumentRepository, InMemoryAuditRepository,
    InMemoryAuthorizationRepository, InMemoryDocumentRepository, InMemoryNotificationRepository,
    InMemoryPreferenceRepository, InMemoryUserRepository, InMemoryValidationRequestRepository,
    NotificationRepository, PreferenceRepository, RepositoryError, SqlAuditRepository,
    SqlAuthorizationRepository, SqlDocumentRepository, SqlNotificationRepository,
    SqlPreferenceRepository, SqlUserRepository, SqlValidationRequestRepository, UserRepository,
    ValidationRequestRepository,
};
use crate::DbPool;

/// Reload-and-reapply rounds before a transition gives up on a request that
/// keeps changing underneath it.
const MAX_TRANSITION_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct Repositories {
    pub validation_requests: Arc<dyn ValidationRequestRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub users: Arc<dyn UserRepository>,
    pub authorizations: Arc<dyn AuthorizationRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub preferences: Arc<dyn PreferenceRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            validation_requests: Arc::new(InMemoryValidationRequestRepository::default()),
            documents: Arc::new(InMemoryDocumentRepository::default()),
            users: Arc::new(InMemoryUserRepository::default()),
            authorizations: Arc::new(InMemoryAuthorizationRepository::default()),
            notifications: Arc::new(InMemoryNotificationRepository::default()),
            preferences: Arc::new(InMemoryPreferenceRepository::default()),
            audit: Arc::new(InMemoryAuditRepository::default()),
        }
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            validation_requests: Arc::new(SqlValidationRequestRepository::new(pool.clone())),
            documents: Arc::new(SqlDocumentRepository::new(pool.clone())),
            users: Arc::new(SqlUserRepository::new(pool.clone())),
            authorizations: Arc::new(SqlAuthorizationRepository::new(pool.clone())),
            notifications: Arc::new(SqlNotificationRepository::new(pool.clone())),
            preferences: Arc::new(SqlPreferenceRepository::new(pool.clone())),
            audit: Arc::new(SqlAuditRepository::new(pool)),
        }
    }
}

/// Input for opening a validation request on a document.
#[derive(Clone, Debug, Default)]
pub struct ValidationRequestDraft {
    pub validators: Vec<UserId>,
    /// Falls back to the configured default quorum.
    pub min_validations: Option<u32>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TransitionReceipt {
    pub request: ValidationRequest,
    pub outcome: WorkflowOutcome,
    pub notifications: Vec<Notification>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DocumentValidationSummary {
    pub document_id: DocumentId,
    pub validation_status: &'static str,
    pub validation_pending: bool,
    pub validated: bool,
    pub current_validation_request: Option<ValidationRequest>,
    pub history: Vec<ValidationRequest>,
}

pub struct ValidationService {
    repositories: Repositories,
    engine: ValidationEngine<RejectionPolicy>,
    dispatcher: NotificationDispatcher,
    default_min_validations: u32,
}

impl ValidationService {
    pub fn new(
        repositories: Repositories,
        policy: RejectionPolicy,
        default_min_validations: u32,
    ) -> Self {
        Self {
            repositories,
            engine: ValidationEngine::new(policy),
            dispatcher: NotificationDispatcher,
            default_min_validations: default_min_validations.max(1),
        }
    }

    pub fn from_config(repositories: Repositories, config: &WorkflowConfig) -> Self {
        Self::new(repositories, config.rejection_policy, config.default_min_validations)
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    pub fn policy(&self) -> RejectionPolicy {
        *self.engine.policy()
    }

    pub async fn request_validation(
        &self,
        document_id: &DocumentId,
        draft: ValidationRequestDraft,
        context: &WorkflowContext,
    ) -> Result<TransitionReceipt, ApplicationError> {
        let document = self.load_document(document_id).await?;
        let actor = self.load_user(&context.actor).await?;
        let grants = self.repositories.authorizations.list_for_document(&document.id).await?;
        let audit = audit_context(None, &document.id, context);

        if !DocumentAccess::new(&document, &grants).can_request_validation(&actor) {
            return Err(self
                .deny(
                    audit,
                    "request_validation",
                    format!(
                        "user `{}` cannot request validation of document `{}`",
                        actor.id, document.id
                    ),
                )
                .await);
        }

        let history = self.repositories.validation_requests.list_for_document(&document.id).await?;
        ValidationHistory::new(&document, &history).ensure_can_request()?;

        let min_validations = draft.min_validations.unwrap_or(self.default_min_validations);
        let validators = distinct(&draft.validators);
        if !validators.is_empty() && min_validations as usize > validators.len() {
            return Err(WorkflowError::QuorumUnreachable {
                min_validations,
                validator_count: validators.len(),
            }
            .into());
        }
        self.ensure_validators_eligible(&document, &grants, &validators, &audit).await?;

        let mut request = self.engine.open(
            NewValidationRequest {
                document_id: document.id.clone(),
                requester_id: actor.id.clone(),
                min_validations,
                description: draft.description,
                due_date: draft.due_date,
            },
            context,
        )?;

        let sink = InMemoryAuditSink::default();
        sink.emit(
            audit_context(Some(&request.id), &document.id, context)
                .event("validation.request_opened", AuditCategory::Workflow, AuditOutcome::Success)
                .with_metadata("min_validations", min_validations.to_string())
                .with_metadata("policy", self.engine.policy().name()),
        );

        let outcome = if validators.is_empty() {
            WorkflowOutcome { from: request.status, to: request.status, events: Vec::new() }
        } else {
            let command = WorkflowCommand::AddValidators { validators };
            self.engine.apply_with_audit(&mut request, &command, context, &sink)?
        };

        let request_id = request.id.clone();
        self.commit(request, &document, outcome, context, sink).await?.ok_or_else(|| {
            ApplicationError::Conflict(format!("validation request `{request_id}` already exists"))
        })
    }

    pub async fn add_validators(
        &self,
        request_id: &ValidationRequestId,
        validators: &[UserId],
        context: &WorkflowContext,
    ) -> Result<TransitionReceipt, ApplicationError> {
        let request = self.load_request(request_id).await?;
        let document = self.load_document(&request.document_id).await?;
        let actor = self.load_user(&context.actor).await?;
        let grants = self.repositories.authorizations.list_for_document(&document.id).await?;
        let audit = audit_context(Some(&request.id), &document.id, context);

        let may_assign = request.requester_id == actor.id
            || DocumentAccess::new(&document, &grants).can_request_validation(&actor);
        if !may_assign {
            return Err(self
                .deny(
                    audit,
                    "add_validators",
                    format!("user `{}` cannot assign validators to `{}`", actor.id, request.id),
                )
                .await);
        }

        let validators = distinct(validators);
        self.ensure_validators_eligible(&document, &grants, &validators, &audit).await?;

        self.transition(request, &document, WorkflowCommand::AddValidators { validators }, context)
            .await
    }

    pub async fn approve(
        &self,
        request_id: &ValidationRequestId,
        comment: Option<String>,
        context: &WorkflowContext,
    ) -> Result<TransitionReceipt, ApplicationError> {
        let request = self.load_request(request_id).await?;
        let document = self.load_document(&request.document_id).await?;
        self.transition(request, &document, WorkflowCommand::Approve { comment }, context).await
    }

    pub async fn reject(
        &self,
        request_id: &ValidationRequestId,
        comment: Option<String>,
        context: &WorkflowContext,
    ) -> Result<TransitionReceipt, ApplicationError> {
        let request = self.load_request(request_id).await?;
        let document = self.load_document(&request.document_id).await?;
        self.transition(request, &document, WorkflowCommand::Reject { comment }, context).await
    }

    /// Only the requester or an admin of the document's organization may
    /// withdraw a request.
    pub async fn cancel(
        &self,
        request_id: &ValidationRequestId,
        reason: Option<String>,
        context: &WorkflowContext,
    ) -> Result<TransitionReceipt, ApplicationError> {
        let request = self.load_request(request_id).await?;
        let document = self.load_document(&request.document_id).await?;
        let actor = self.load_user(&context.actor).await?;

        let admin = DocumentAccess::new(&document, &[]).can_administer(&actor);
        if request.requester_id != actor.id && !admin {
            let audit = audit_context(Some(&request.id), &document.id, context);
            return Err(self
                .deny(
                    audit,
                    "cancel",
                    format!(
                        "user `{}` cannot cancel validation request `{}`",
                        actor.id, request.id
                    ),
                )
                .await);
        }

        self.transition(request, &document, WorkflowCommand::Cancel { reason }, context).await
    }

    pub async fn check_completion(
        &self,
        request_id: &ValidationRequestId,
        context: &WorkflowContext,
    ) -> Result<TransitionReceipt, ApplicationError> {
        self.load_user(&context.actor).await?;
        let request = self.load_request(request_id).await?;
        let document = self.load_document(&request.document_id).await?;
        self.transition(request, &document, WorkflowCommand::CheckCompletion, context).await
    }

    pub async fn get_request(
        &self,
        request_id: &ValidationRequestId,
        context: &WorkflowContext,
    ) -> Result<ValidationRequest, ApplicationError> {
        let request = self.load_request(request_id).await?;
        let document = self.load_document(&request.document_id).await?;
        self.ensure_readable(&document, Some(&request), context).await?;
        Ok(request)
    }

    pub async fn progress(
        &self,
        request_id: &ValidationRequestId,
        context: &WorkflowContext,
    ) -> Result<ValidationProgress, ApplicationError> {
        Ok(self.get_request(request_id, context).await?.validation_progress())
    }

    pub async fn document_summary(
        &self,
        document_id: &DocumentId,
        context: &WorkflowContext,
    ) -> Result<DocumentValidationSummary, ApplicationError> {
        let document = self.load_document(document_id).await?;
        self.ensure_readable(&document, None, context).await?;

        let requests = self.repositories.validation_requests.list_for_document(&document.id).await?;
        let history = ValidationHistory::new(&document, &requests);

        Ok(DocumentValidationSummary {
            document_id: document.id.clone(),
            validation_status: status_label(history.validation_status()),
            validation_pending: history.validation_pending(),
            validated: history.validated(),
            current_validation_request: history.current_validation_request().cloned(),
            history: history
                .validation_history()
                .iter()
                .map(|request| (*request).clone())
                .collect(),
        })
    }

    /// Pending requests still waiting on the acting user's decision.
    pub async fn awaiting_my_validation(
        &self,
        context: &WorkflowContext,
    ) -> Result<Vec<ValidationRequest>, ApplicationError> {
        let actor = self.load_user(&context.actor).await?;
        Ok(self.repositories.validation_requests.list_awaiting_validator(&actor.id).await?)
    }

    /// Requests the acting user opened, newest first.
    pub async fn my_requests(
        &self,
        context: &WorkflowContext,
    ) -> Result<Vec<ValidationRequest>, ApplicationError> {
        let actor = self.load_user(&context.actor).await?;
        Ok(self.repositories.validation_requests.list_for_requester(&actor.id).await?)
    }

    /// Requests the acting user was assigned to, including the ones already
    /// decided.
    pub async fn my_validations(
        &self,
        context: &WorkflowContext,
    ) -> Result<Vec<ValidationRequest>, ApplicationError> {
        let actor = self.load_user(&context.actor).await?;
        Ok(self.repositories.validation_requests.list_for_validator(&actor.id).await?)
    }

    pub async fn notifications(
        &self,
        user_id: &UserId,
        unread_only: bool,
        context: &WorkflowContext,
    ) -> Result<Vec<Notification>, ApplicationError> {
        self.ensure_self_or_admin(user_id, context).await?;
        Ok(self.repositories.notifications.list_for_user(user_id, unread_only).await?)
    }

    /// Marking an already-read notification keeps its first read time.
    pub async fn mark_notification_read(
        &self,
        notification_id: &NotificationId,
        context: &WorkflowContext,
    ) -> Result<Notification, ApplicationError> {
        let mut notification = self
            .repositories
            .notifications
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| not_found("notification", &notification_id.0))?;
        if notification.user_id != context.actor {
            return Err(ApplicationError::Forbidden(format!(
                "notification `{}` belongs to another user",
                notification_id.0
            )));
        }

        if notification.mark_as_read(context.occurred_at) {
            self.repositories.notifications.save(notification.clone()).await?;
        }
        Ok(notification)
    }

    pub async fn mark_all_notifications_read(
        &self,
        context: &WorkflowContext,
    ) -> Result<u64, ApplicationError> {
        let changed = self
            .repositories
            .notifications
            .mark_all_read(&context.actor, context.occurred_at)
            .await?;
        debug!(
            event_name = "notification.marked_all_read",
            correlation_id = %context.correlation_id,
            user_id = %context.actor,
            changed,
            "notifications marked read"
        );
        Ok(changed)
    }

    /// Stored preferences overlaid on the per-type defaults.
    pub async fn notification_preferences(
        &self,
        user_id: &UserId,
        context: &WorkflowContext,
    ) -> Result<Vec<UserNotificationPreference>, ApplicationError> {
        self.ensure_self_or_admin(user_id, context).await?;

        let stored: HashMap<NotificationType, UserNotificationPreference> = self
            .repositories
            .preferences
            .list_for_user(user_id)
            .await?
            .into_iter()
            .map(|preference| (preference.notification_type, preference))
            .collect();

        Ok(UserNotificationPreference::defaults_for_user(user_id)
            .into_iter()
            .map(|default| stored.get(&default.notification_type).cloned().unwrap_or(default))
            .collect())
    }

    pub async fn update_notification_preference(
        &self,
        preference: UserNotificationPreference,
        context: &WorkflowContext,
    ) -> Result<UserNotificationPreference, ApplicationError> {
        self.ensure_self_or_admin(&preference.user_id, context).await?;
        self.repositories.preferences.save(preference.clone()).await?;
        Ok(preference)
    }

    /// Applies `command` and saves the result. When another writer saved the
    /// request in between, the request is reloaded and the command re-applied
    /// to the fresh copy, so concurrent decisions are never dropped.
    async fn transition(
        &self,
        mut request: ValidationRequest,
        document: &Document,
        command: WorkflowCommand,
        context: &WorkflowContext,
    ) -> Result<TransitionReceipt, ApplicationError> {
        let request_id = request.id.clone();

        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let sink = InMemoryAuditSink::default();
            let outcome =
                match self.engine.apply_with_audit(&mut request, &command, context, &sink) {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        warn!(
                            event_name = "validation.transition_rejected",
                            correlation_id = %context.correlation_id,
                            validation_request_id = %request.id,
                            actor = %context.actor,
                            command = command.name(),
                            error = %error,
                            "workflow transition rejected"
                        );
                        self.flush_audit(sink.events()).await;
                        return Err(error.into());
                    }
                };

            match self.commit(request, document, outcome, context, sink).await? {
                Some(receipt) => return Ok(receipt),
                None => {
                    debug!(
                        event_name = "validation.transition_retried",
                        correlation_id = %context.correlation_id,
                        validation_request_id = %request_id,
                        command = command.name(),
                        attempt,
                        "request changed concurrently; reapplying to fresh copy"
                    );
                    request = self.load_request(&request_id).await?;
                }
            }
        }

        Err(ApplicationError::Conflict(format!(
            "validation request `{request_id}` kept changing; retry later"
        )))
    }

    /// Returns `None` when the save lost a race with another writer. Nothing
    /// is persisted in that case.
    async fn commit(
        &self,
        request: ValidationRequest,
        document: &Document,
        outcome: WorkflowOutcome,
        context: &WorkflowContext,
        sink: InMemoryAuditSink,
    ) -> Result<Option<TransitionReceipt>, ApplicationError> {
        let request = match self.repositories.validation_requests.save(request).await {
            Ok(saved) => saved,
            Err(RepositoryError::Stale(_)) => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let notifications =
            self.dispatch(&request, document, &outcome.events, context, &sink).await?;
        self.flush_audit(sink.events()).await;

        info!(
            event_name = "validation.transition_committed",
            correlation_id = %context.correlation_id,
            validation_request_id = %request.id,
            document_id = %request.document_id,
            actor = %context.actor,
            from = %outcome.from,
            to = %outcome.to,
            events = outcome.events.len(),
            notifications = notifications.len(),
            "workflow transition committed"
        );

        Ok(Some(TransitionReceipt { request, outcome, notifications }))
    }

    async fn dispatch(
        &self,
        request: &ValidationRequest,
        document: &Document,
        events: &[WorkflowEvent],
        context: &WorkflowContext,
        sink: &InMemoryAuditSink,
    ) -> Result<Vec<Notification>, ApplicationError> {
        if events.iter().all(|event| matches!(event, WorkflowEvent::DecisionRecorded { .. })) {
            return Ok(Vec::new());
        }

        let mut user_ids: Vec<UserId> = request.validators().cloned().collect();
        user_ids.push(request.requester_id.clone());
        user_ids.push(context.actor.clone());
        user_ids.sort();
        user_ids.dedup();
        let users: HashMap<UserId, User> = self
            .repositories
            .users
            .find_many(&user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();
        let dispatch_context = DispatchContext { document, users: &users };
        let audit = audit_context(Some(&request.id), &request.document_id, context);

        let mut delivered = Vec::new();
        for event in events {
            for draft in self.dispatcher.drafts_for(event, &dispatch_context) {
                let recipient = draft.recipient.clone();
                let notification_type = draft.notification_type;
                let preference =
                    self.repositories.preferences.find(&recipient, notification_type).await?;

                match self.dispatcher.deliver(draft, preference.as_ref(), context.occurred_at) {
                    Some(notification) => {
                        self.repositories.notifications.save(notification.clone()).await?;
                        sink.emit(
                            audit
                                .event(
                                    "notification.created",
                                    AuditCategory::Notification,
                                    AuditOutcome::Success,
                                )
                                .with_metadata("recipient", recipient.0.clone())
                                .with_metadata("notification_type", notification_type.as_str())
                                .with_metadata("trigger", event.name()),
                        );
                        delivered.push(notification);
                    }
                    None => {
                        debug!(
                            event_name = "notification.suppressed",
                            correlation_id = %context.correlation_id,
                            recipient = %recipient,
                            notification_type = notification_type.as_str(),
                            "recipient disabled this notification type"
                        );
                        sink.emit(
                            audit
                                .event(
                                    "notification.suppressed",
                                    AuditCategory::Notification,
                                    AuditOutcome::Rejected,
                                )
                                .with_metadata("recipient", recipient.0.clone())
                                .with_metadata("notification_type", notification_type.as_str()),
                        );
                    }
                }
            }
        }

        Ok(delivered)
    }

    async fn ensure_validators_eligible(
        &self,
        document: &Document,
        grants: &[Authorization],
        validators: &[UserId],
        audit: &AuditContext,
    ) -> Result<(), ApplicationError> {
        if validators.is_empty() {
            return Ok(());
        }

        let users = self.repositories.users.find_many(validators).await?;
        let access = DocumentAccess::new(document, grants);
        for validator_id in validators {
            let user = users
                .iter()
                .find(|user| &user.id == validator_id)
                .ok_or_else(|| not_found("user", &validator_id.0))?;
            if !access.can_validate(user) {
                return Err(self
                    .deny(
                        audit.clone(),
                        "add_validators",
                        format!("user `{}` cannot validate document `{}`", user.id, document.id),
                    )
                    .await);
            }
        }
        Ok(())
    }

    async fn ensure_readable(
        &self,
        document: &Document,
        request: Option<&ValidationRequest>,
        context: &WorkflowContext,
    ) -> Result<(), ApplicationError> {
        let actor = self.load_user(&context.actor).await?;
        let involved = request.is_some_and(|request| {
            request.requester_id == actor.id || request.validation_for(&actor.id).is_some()
        });
        if involved {
            return Ok(());
        }

        let grants = self.repositories.authorizations.list_for_document(&document.id).await?;
        if DocumentAccess::new(document, &grants).can_read(&actor) {
            return Ok(());
        }

        let audit = audit_context(request.map(|request| &request.id), &document.id, context);
        let message = format!("user `{}` cannot read document `{}`", actor.id, document.id);
        Err(self.deny(audit, "read", message).await)
    }

    async fn ensure_self_or_admin(
        &self,
        user_id: &UserId,
        context: &WorkflowContext,
    ) -> Result<(), ApplicationError> {
        if user_id == &context.actor {
            return Ok(());
        }
        let actor = self.load_user(&context.actor).await?;
        if actor.admin {
            let target = self.load_user(user_id).await?;
            if actor.belongs_to(&target.organization_id) {
                return Ok(());
            }
        }
        Err(ApplicationError::Forbidden(format!(
            "user `{}` cannot access notifications of `{}`",
            actor.id, user_id
        )))
    }

    async fn deny(&self, audit: AuditContext, action: &str, message: String) -> ApplicationError {
        warn!(
            event_name = "access.denied",
            correlation_id = %audit.correlation_id,
            actor = %audit.actor,
            action,
            "{message}"
        );
        self.flush_audit(vec![audit
            .event("access.denied", AuditCategory::Access, AuditOutcome::Rejected)
            .with_metadata("action", action)
            .with_metadata("reason", message.clone())])
            .await;
        ApplicationError::Forbidden(message)
    }

    /// Audit failures are logged, never surfaced: the transition is already
    /// committed by the time its audit trail is written.
    async fn flush_audit(&self, events: Vec<AuditEvent>) {
        for event in &events {
            TracingAuditSink.emit(event.clone());
        }
        if let Err(error) = self.repositories.audit.append(events).await {
            warn!(
                event_name = "audit.persist_failed",
                error = %error,
                "could not persist audit events"
            );
        }
    }

    async fn load_request(
        &self,
        id: &ValidationRequestId,
    ) -> Result<ValidationRequest, ApplicationError> {
        self.repositories
            .validation_requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found("validation request", &id.0))
    }

    async fn load_document(&self, id: &DocumentId) -> Result<Document, ApplicationError> {
        self.repositories
            .documents
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found("document", &id.0))
    }

    async fn load_user(&self, id: &UserId) -> Result<User, ApplicationError> {
        self.repositories.users.find_by_id(id).await?.ok_or_else(|| not_found("user", &id.0))
    }
}

fn not_found(entity: &'static str, id: &str) -> ApplicationError {
    ApplicationError::NotFound { entity, id: id.to_owned() }
}

fn audit_context(
    request_id: Option<&ValidationRequestId>,
    document_id: &DocumentId,
    context: &WorkflowContext,
) -> AuditContext {
    AuditContext::new(
        request_id.cloned(),
        Some(document_id.clone()),
        context.correlation_id.clone(),
        context.actor.0.clone(),
    )
}

/// Order-preserving de-duplication.
fn distinct(ids: &[UserId]) -> Vec<UserId> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}
