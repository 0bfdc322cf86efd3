//! Turns workflow events into notifications.
//!
//! The dispatcher is a pure consumer of [`WorkflowEvent`]s: it decides who
//! hears about a transition and what they read, then applies the recipient's
//! delivery preference. Persisting the result is the caller's job.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::domain::document::Document;
use crate::domain::notification::{
    DeliveryChannels, Frequency, Notifiable, Notification, NotificationId, NotificationType,
    UserNotificationPreference,
};
use crate::domain::user::{User, UserId};
use crate::workflow::states::WorkflowEvent;

/// What the dispatcher needs to know to phrase a notification.
pub struct DispatchContext<'a> {
    pub document: &'a Document,
    pub users: &'a HashMap<UserId, User>,
}

impl DispatchContext<'_> {
    fn display_name(&self, user_id: &UserId) -> String {
        self.users
            .get(user_id)
            .map(|user| user.full_name.clone())
            .unwrap_or_else(|| user_id.0.clone())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NotificationDraft {
    pub recipient: UserId,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub notifiable: Notifiable,
    pub data: Map<String, Value>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    pub fn drafts_for(
        &self,
        event: &WorkflowEvent,
        context: &DispatchContext<'_>,
    ) -> Vec<NotificationDraft> {
        let title = &context.document.title;

        match event {
            WorkflowEvent::ValidatorAssigned {
                request_id,
                document_id,
                requester_id,
                validator_id,
                min_validations,
            } => vec![NotificationDraft {
                recipient: validator_id.clone(),
                notification_type: NotificationType::DocumentValidationRequested,
                title: "Validation requested".to_owned(),
                message: format!(
                    "{} requests your validation for '{title}'",
                    context.display_name(requester_id)
                ),
                notifiable: validation_request(&request_id.0),
                data: object(json!({
                    "document_id": document_id.0,
                    "requester_id": requester_id.0,
                    "min_validations": min_validations,
                })),
            }],
            WorkflowEvent::RequestApproved {
                request_id,
                document_id,
                requester_id,
                approved_count,
                total_validators,
            } => vec![NotificationDraft {
                recipient: requester_id.clone(),
                notification_type: NotificationType::DocumentValidationApproved,
                title: "Validation approved".to_owned(),
                message: format!("Your validation request for '{title}' has been approved"),
                notifiable: validation_request(&request_id.0),
                data: object(json!({
                    "document_id": document_id.0,
                    "approved_count": approved_count,
                    "total_validators": total_validators,
                })),
            }],
            WorkflowEvent::RequestRejected {
                request_id,
                document_id,
                requester_id,
                rejected_by,
                comment,
            } => {
                let message = match rejected_by {
                    Some(validator_id) => format!(
                        "Your validation request for '{title}' was rejected by {}",
                        context.display_name(validator_id)
                    ),
                    None => format!("Your validation request for '{title}' was rejected"),
                };
                vec![NotificationDraft {
                    recipient: requester_id.clone(),
                    notification_type: NotificationType::DocumentValidationRejected,
                    title: "Validation rejected".to_owned(),
                    message,
                    notifiable: validation_request(&request_id.0),
                    data: object(json!({
                        "document_id": document_id.0,
                        "rejected_by": rejected_by.as_ref().map(|id| context.display_name(id)),
                        "rejection_comment": comment,
                    })),
                }]
            }
            WorkflowEvent::RequestCancelled {
                request_id,
                document_id,
                cancelled_by,
                reason,
                pending_validators,
                ..
            } => pending_validators
                .iter()
                .map(|validator_id| NotificationDraft {
                    recipient: validator_id.clone(),
                    notification_type: NotificationType::DocumentValidationRejected,
                    title: "Validation cancelled".to_owned(),
                    message: format!(
                        "{} withdrew the validation request for '{title}'",
                        context.display_name(cancelled_by)
                    ),
                    notifiable: validation_request(&request_id.0),
                    data: object(json!({
                        "document_id": document_id.0,
                        "cancelled_by": cancelled_by.0,
                        "reason": reason,
                    })),
                })
                .collect(),
            WorkflowEvent::DecisionRecorded { .. } => Vec::new(),
        }
    }

    /// Resolves delivery for one draft. Without a stored preference the
    /// notification type's defaults apply. Returns `None` when the recipient
    /// turned this notification type off.
    pub fn deliver(
        &self,
        draft: NotificationDraft,
        preference: Option<&UserNotificationPreference>,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let preference = match preference {
            Some(preference) => preference.clone(),
            None => UserNotificationPreference::default_for(
                draft.recipient.clone(),
                draft.notification_type,
            ),
        };
        if preference.suppresses_delivery() {
            return None;
        }

        Some(Notification {
            id: NotificationId(Uuid::new_v4().to_string()),
            user_id: draft.recipient,
            notification_type: draft.notification_type,
            title: draft.title,
            message: draft.message,
            notifiable: Some(draft.notifiable),
            data: draft.data,
            channels: DeliveryChannels {
                in_app: preference.should_deliver_in_app(),
                email: preference.should_deliver_email(),
            },
            frequency: if preference.should_deliver_immediately() {
                Frequency::Immediate
            } else {
                preference.frequency
            },
            read_at: None,
            created_at: now,
        })
    }
}

fn validation_request(id: &str) -> Notifiable {
    Notifiable { kind: "validation_request".to_owned(), id: id.to_owned() }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::{DispatchContext, NotificationDispatcher};
    use crate::domain::document::{Container, Document, DocumentId, DocumentStatus};
    use crate::domain::notification::{
        DeliveryMethod, Frequency, NotificationType, UserNotificationPreference,
    };
    use crate::domain::user::{OrganizationId, User, UserId};
    use crate::domain::validation::ValidationRequestId;
    use crate::workflow::states::{Decision, WorkflowEvent};

    fn document() -> Document {
        Document {
            id: DocumentId("DOC-1".to_owned()),
            title: "Budget Q2 2025".to_owned(),
            status: DocumentStatus::Published,
            uploaded_by: UserId("requester".to_owned()),
            container: Container::Space {
                id: "space-1".to_owned(),
                organization_id: OrganizationId("org-1".to_owned()),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn users() -> HashMap<UserId, User> {
        [("requester", "Camille Martin"), ("validator", "Louis Bernard")]
            .into_iter()
            .map(|(id, name)| {
                (
                    UserId(id.to_owned()),
                    User {
                        id: UserId(id.to_owned()),
                        full_name: name.to_owned(),
                        email: format!("{id}@example.com"),
                        organization_id: OrganizationId("org-1".to_owned()),
                        admin: false,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn assignment_notifies_the_validator_with_requester_name() {
        let document = document();
        let users = users();
        let drafts = NotificationDispatcher.drafts_for(
            &WorkflowEvent::ValidatorAssigned {
                request_id: ValidationRequestId("VR-1".to_owned()),
                document_id: document.id.clone(),
                requester_id: UserId("requester".to_owned()),
                validator_id: UserId("validator".to_owned()),
                min_validations: 2,
            },
            &DispatchContext { document: &document, users: &users },
        );

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].recipient, UserId("validator".to_owned()));
        assert_eq!(drafts[0].notification_type, NotificationType::DocumentValidationRequested);
        assert!(drafts[0].message.contains("Camille Martin"));
        assert!(drafts[0].message.contains("Budget Q2 2025"));
        assert_eq!(drafts[0].data.get("min_validations"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn rejection_names_the_rejecting_validator() {
        let document = document();
        let users = users();
        let drafts = NotificationDispatcher.drafts_for(
            &WorkflowEvent::RequestRejected {
                request_id: ValidationRequestId("VR-1".to_owned()),
                document_id: document.id.clone(),
                requester_id: UserId("requester".to_owned()),
                rejected_by: Some(UserId("validator".to_owned())),
                comment: Some("Totals do not match".to_owned()),
            },
            &DispatchContext { document: &document, users: &users },
        );

        assert_eq!(drafts[0].recipient, UserId("requester".to_owned()));
        assert!(drafts[0].message.ends_with("rejected by Louis Bernard"));
        assert_eq!(
            drafts[0].data.get("rejection_comment"),
            Some(&serde_json::json!("Totals do not match"))
        );
    }

    #[test]
    fn recorded_decisions_do_not_notify() {
        let document = document();
        let users = users();
        let drafts = NotificationDispatcher.drafts_for(
            &WorkflowEvent::DecisionRecorded {
                request_id: ValidationRequestId("VR-1".to_owned()),
                document_id: document.id.clone(),
                validator_id: UserId("validator".to_owned()),
                decision: Decision::Approve,
                comment: None,
            },
            &DispatchContext { document: &document, users: &users },
        );

        assert!(drafts.is_empty());
    }

    #[test]
    fn disabled_preference_suppresses_delivery() {
        let document = document();
        let users = users();
        let draft = NotificationDispatcher
            .drafts_for(
                &WorkflowEvent::RequestApproved {
                    request_id: ValidationRequestId("VR-1".to_owned()),
                    document_id: document.id.clone(),
                    requester_id: UserId("requester".to_owned()),
                    approved_count: 2,
                    total_validators: 3,
                },
                &DispatchContext { document: &document, users: &users },
            )
            .remove(0);

        let disabled = UserNotificationPreference {
            user_id: UserId("requester".to_owned()),
            notification_type: NotificationType::DocumentValidationApproved,
            delivery_method: DeliveryMethod::Disabled,
            frequency: Frequency::Immediate,
            enabled: true,
        };
        let suppressed = NotificationDispatcher.deliver(draft.clone(), Some(&disabled), Utc::now());
        assert!(suppressed.is_none());

        let email_only = UserNotificationPreference {
            delivery_method: DeliveryMethod::Email,
            frequency: Frequency::WeeklyDigest,
            ..disabled
        };
        let notification = NotificationDispatcher
            .deliver(draft.clone(), Some(&email_only), Utc::now())
            .expect("email delivery");
        assert!(notification.channels.email);
        assert!(!notification.channels.in_app);
        assert_eq!(notification.frequency, Frequency::WeeklyDigest);

        let defaulted =
            NotificationDispatcher.deliver(draft, None, Utc::now()).expect("default delivery");
        assert!(defaulted.channels.in_app && defaulted.channels.email);
        assert_eq!(defaulted.frequency, Frequency::Immediate);
    }
}
