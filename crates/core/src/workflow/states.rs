use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::document::DocumentId;
use crate::domain::user::UserId;
use crate::domain::validation::{ValidationRequestId, ValidationRequestStatus};

/// Who is acting, and when. Passed explicitly into every workflow
/// operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub actor: UserId,
    pub correlation_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowContext {
    pub fn new(actor: UserId, correlation_id: impl Into<String>) -> Self {
        Self { actor, correlation_id: correlation_id.into(), occurred_at: Utc::now() }
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkflowCommand {
    AddValidators { validators: Vec<UserId> },
    Approve { comment: Option<String> },
    Reject { comment: Option<String> },
    Cancel { reason: Option<String> },
    CheckCompletion,
}

impl WorkflowCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddValidators { .. } => "add_validators",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Cancel { .. } => "cancel",
            Self::CheckCompletion => "check_completion",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    ValidatorAssigned {
        request_id: ValidationRequestId,
        document_id: DocumentId,
        requester_id: UserId,
        validator_id: UserId,
        min_validations: u32,
    },
    DecisionRecorded {
        request_id: ValidationRequestId,
        document_id: DocumentId,
        validator_id: UserId,
        decision: Decision,
        comment: Option<String>,
    },
    RequestApproved {
        request_id: ValidationRequestId,
        document_id: DocumentId,
        requester_id: UserId,
        approved_count: usize,
        total_validators: usize,
    },
    RequestRejected {
        request_id: ValidationRequestId,
        document_id: DocumentId,
        requester_id: UserId,
        rejected_by: Option<UserId>,
        comment: Option<String>,
    },
    RequestCancelled {
        request_id: ValidationRequestId,
        document_id: DocumentId,
        requester_id: UserId,
        cancelled_by: UserId,
        reason: Option<String>,
        pending_validators: Vec<UserId>,
    },
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidatorAssigned { .. } => "validation.validator_assigned",
            Self::DecisionRecorded { .. } => "validation.decision_recorded",
            Self::RequestApproved { .. } => "validation.request_approved",
            Self::RequestRejected { .. } => "validation.request_rejected",
            Self::RequestCancelled { .. } => "validation.request_cancelled",
        }
    }

    pub fn request_id(&self) -> &ValidationRequestId {
        match self {
            Self::ValidatorAssigned { request_id, .. }
            | Self::DecisionRecorded { request_id, .. }
            | Self::RequestApproved { request_id, .. }
            | Self::RequestRejected { request_id, .. }
            | Self::RequestCancelled { request_id, .. } => request_id,
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        match self {
            Self::ValidatorAssigned { document_id, .. }
            | Self::DecisionRecorded { document_id, .. }
            | Self::RequestApproved { document_id, .. }
            | Self::RequestRejected { document_id, .. }
            | Self::RequestCancelled { document_id, .. } => document_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub from: ValidationRequestStatus,
    pub to: ValidationRequestStatus,
    pub events: Vec<WorkflowEvent>,
}

impl WorkflowOutcome {
    pub fn transitioned(&self) -> bool {
        self.from != self.to
    }

    pub(crate) fn merge(mut self, next: WorkflowOutcome) -> Self {
        self.to = next.to;
        self.events.extend(next.events);
        self
    }
}
