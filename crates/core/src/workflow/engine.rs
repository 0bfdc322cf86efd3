use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::document::DocumentId;
use crate::domain::user::UserId;
use crate::domain::validation::{
    DocumentValidation, DocumentValidationId, DocumentValidationStatus, ValidationRequest,
    ValidationRequestId, ValidationRequestStatus,
};
use crate::workflow::policy::{CompletionPolicy, RejectionPolicy, ValidationTally, Verdict};
use crate::workflow::states::{
    Decision, WorkflowCommand, WorkflowContext, WorkflowEvent, WorkflowOutcome,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewValidationRequest {
    pub document_id: DocumentId,
    pub requester_id: UserId,
    pub min_validations: u32,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("min_validations must be greater than zero (got {min_validations})")]
    InvalidQuorum { min_validations: u32 },
    #[error("min_validations {min_validations} exceeds the {validator_count} assigned validators")]
    QuorumUnreachable { min_validations: u32, validator_count: usize },
    #[error("validation request `{request_id}` is {status} and no longer accepts changes")]
    NotPending { request_id: ValidationRequestId, status: ValidationRequestStatus },
    #[error("validator `{validator_id}` is already assigned to validation request `{request_id}`")]
    DuplicateValidator { request_id: ValidationRequestId, validator_id: UserId },
    #[error("user `{validator_id}` is not a validator of validation request `{request_id}`")]
    NotAssigned { request_id: ValidationRequestId, validator_id: UserId },
    #[error("validator `{validator_id}` already {status} validation request `{request_id}`")]
    AlreadyDecided {
        request_id: ValidationRequestId,
        validator_id: UserId,
        status: DocumentValidationStatus,
    },
    #[error("a comment is required to reject a document")]
    CommentRequired,
}

pub struct ValidationEngine<P> {
    policy: P,
}

impl<P> ValidationEngine<P>
where
    P: CompletionPolicy,
{
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn open(
        &self,
        draft: NewValidationRequest,
        context: &WorkflowContext,
    ) -> Result<ValidationRequest, WorkflowError> {
        if draft.min_validations == 0 {
            return Err(WorkflowError::InvalidQuorum { min_validations: draft.min_validations });
        }

        Ok(ValidationRequest {
            id: ValidationRequestId(Uuid::new_v4().to_string()),
            document_id: draft.document_id,
            requester_id: draft.requester_id,
            min_validations: draft.min_validations,
            status: ValidationRequestStatus::Pending,
            description: normalize_text(draft.description),
            due_date: draft.due_date,
            created_at: context.occurred_at,
            updated_at: context.occurred_at,
            completed_at: None,
            version: 0,
            validations: Vec::new(),
        })
    }

    pub fn apply(
        &self,
        request: &mut ValidationRequest,
        command: &WorkflowCommand,
        context: &WorkflowContext,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        match command {
            WorkflowCommand::AddValidators { validators } => {
                self.add_validators(request, validators, context)
            }
            WorkflowCommand::Approve { comment } => {
                self.record_decision(request, Decision::Approve, comment.clone(), context)
            }
            WorkflowCommand::Reject { comment } => {
                self.record_decision(request, Decision::Reject, comment.clone(), context)
            }
            WorkflowCommand::Cancel { reason } => self.cancel(request, reason.clone(), context),
            WorkflowCommand::CheckCompletion => Ok(self.check_completion(request, context)),
        }
    }

    pub fn apply_with_audit<S>(
        &self,
        request: &mut ValidationRequest,
        command: &WorkflowCommand,
        context: &WorkflowContext,
        sink: &S,
    ) -> Result<WorkflowOutcome, WorkflowError>
    where
        S: AuditSink,
    {
        let audit = AuditContext::new(
            Some(request.id.clone()),
            Some(request.document_id.clone()),
            context.correlation_id.clone(),
            context.actor.0.clone(),
        );
        let result = self.apply(request, command, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    audit
                        .event(
                            "validation.transition_applied",
                            AuditCategory::Workflow,
                            AuditOutcome::Success,
                        )
                        .with_metadata("command", command.name())
                        .with_metadata("from", outcome.from.as_str())
                        .with_metadata("to", outcome.to.as_str())
                        .with_metadata("policy", self.policy.name())
                        .with_metadata("events", outcome.events.len().to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event(
                            "validation.transition_rejected",
                            AuditCategory::Workflow,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("command", command.name())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    /// Assigns validators in one step: either every new validator is added or
    /// none is. Repeats inside `validators` collapse to one assignment.
    pub fn add_validators(
        &self,
        request: &mut ValidationRequest,
        validators: &[UserId],
        context: &WorkflowContext,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        ensure_pending(request)?;

        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for validator_id in validators {
            if !seen.insert(validator_id) {
                continue;
            }
            if request.validation_for(validator_id).is_some() {
                return Err(WorkflowError::DuplicateValidator {
                    request_id: request.id.clone(),
                    validator_id: validator_id.clone(),
                });
            }
            fresh.push(validator_id.clone());
        }

        let mut events = Vec::with_capacity(fresh.len());
        for validator_id in fresh {
            request.validations.push(DocumentValidation {
                id: DocumentValidationId(Uuid::new_v4().to_string()),
                validation_request_id: request.id.clone(),
                validator_id: validator_id.clone(),
                status: DocumentValidationStatus::Pending,
                comment: None,
                validated_at: None,
                created_at: context.occurred_at,
            });
            events.push(WorkflowEvent::ValidatorAssigned {
                request_id: request.id.clone(),
                document_id: request.document_id.clone(),
                requester_id: request.requester_id.clone(),
                validator_id,
                min_validations: request.min_validations,
            });
        }
        if !events.is_empty() {
            request.updated_at = context.occurred_at;
        }

        Ok(WorkflowOutcome { from: request.status, to: request.status, events })
    }

    pub fn approve(
        &self,
        request: &mut ValidationRequest,
        comment: Option<String>,
        context: &WorkflowContext,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.record_decision(request, Decision::Approve, comment, context)
    }

    pub fn reject(
        &self,
        request: &mut ValidationRequest,
        comment: Option<String>,
        context: &WorkflowContext,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.record_decision(request, Decision::Reject, comment, context)
    }

    /// Records the acting validator's decision and recomputes the aggregate.
    /// Decisions still land on a request that already reached a verdict; the
    /// verdict itself never moves.
    pub fn record_decision(
        &self,
        request: &mut ValidationRequest,
        decision: Decision,
        comment: Option<String>,
        context: &WorkflowContext,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let comment = normalize_text(comment);
        if decision == Decision::Reject && comment.is_none() {
            return Err(WorkflowError::CommentRequired);
        }

        let request_id = request.id.clone();
        let document_id = request.document_id.clone();
        let from = request.status;
        let validator_id = context.actor.clone();

        let validation = request
            .validations
            .iter_mut()
            .find(|validation| validation.validator_id == validator_id)
            .ok_or_else(|| WorkflowError::NotAssigned {
                request_id: request_id.clone(),
                validator_id: validator_id.clone(),
            })?;

        if !validation.is_pending() {
            return Err(WorkflowError::AlreadyDecided {
                request_id,
                validator_id,
                status: validation.status,
            });
        }

        validation.status = match decision {
            Decision::Approve => DocumentValidationStatus::Approved,
            Decision::Reject => DocumentValidationStatus::Rejected,
        };
        validation.comment = comment.clone();
        validation.validated_at = Some(context.occurred_at);
        request.updated_at = context.occurred_at;

        let recorded = WorkflowOutcome {
            from,
            to: from,
            events: vec![WorkflowEvent::DecisionRecorded {
                request_id,
                document_id,
                validator_id,
                decision,
                comment,
            }],
        };

        Ok(recorded.merge(self.check_completion(request, context)))
    }

    /// Recomputes the aggregate status from the child validations. Safe to
    /// call any number of times: a terminal request is left untouched.
    pub fn check_completion(
        &self,
        request: &mut ValidationRequest,
        context: &WorkflowContext,
    ) -> WorkflowOutcome {
        let from = request.status;
        if from.is_terminal() {
            return WorkflowOutcome { from, to: from, events: Vec::new() };
        }

        let tally = ValidationTally::of(request);
        let event = match self.policy.evaluate(&tally) {
            None => None,
            Some(Verdict::Approved) => {
                finish(request, ValidationRequestStatus::Approved, context.occurred_at);
                Some(WorkflowEvent::RequestApproved {
                    request_id: request.id.clone(),
                    document_id: request.document_id.clone(),
                    requester_id: request.requester_id.clone(),
                    approved_count: tally.approved,
                    total_validators: request.validations.len(),
                })
            }
            Some(Verdict::Rejected) => {
                finish(request, ValidationRequestStatus::Rejected, context.occurred_at);
                let latest = latest_rejection(request);
                Some(WorkflowEvent::RequestRejected {
                    request_id: request.id.clone(),
                    document_id: request.document_id.clone(),
                    requester_id: request.requester_id.clone(),
                    rejected_by: latest.map(|validation| validation.validator_id.clone()),
                    comment: latest.and_then(|validation| validation.comment.clone()),
                })
            }
        };

        WorkflowOutcome { from, to: request.status, events: event.into_iter().collect() }
    }

    /// Withdraws a pending request. It ends as `rejected`; the event tells the
    /// validators still waiting on it.
    pub fn cancel(
        &self,
        request: &mut ValidationRequest,
        reason: Option<String>,
        context: &WorkflowContext,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        ensure_pending(request)?;

        let from = request.status;
        let pending_validators = request.pending_validators().cloned().collect();
        finish(request, ValidationRequestStatus::Rejected, context.occurred_at);

        Ok(WorkflowOutcome {
            from,
            to: request.status,
            events: vec![WorkflowEvent::RequestCancelled {
                request_id: request.id.clone(),
                document_id: request.document_id.clone(),
                requester_id: request.requester_id.clone(),
                cancelled_by: context.actor.clone(),
                reason: normalize_text(reason),
                pending_validators,
            }],
        })
    }
}

impl Default for ValidationEngine<RejectionPolicy> {
    fn default() -> Self {
        Self::new(RejectionPolicy::default())
    }
}

fn ensure_pending(request: &ValidationRequest) -> Result<(), WorkflowError> {
    if request.is_pending() {
        return Ok(());
    }
    Err(WorkflowError::NotPending { request_id: request.id.clone(), status: request.status })
}

fn finish(request: &mut ValidationRequest, status: ValidationRequestStatus, at: DateTime<Utc>) {
    request.status = status;
    request.completed_at = Some(at);
    request.updated_at = at;
}

fn latest_rejection(request: &ValidationRequest) -> Option<&DocumentValidation> {
    request
        .validations
        .iter()
        .filter(|validation| validation.status == DocumentValidationStatus::Rejected)
        .max_by_key(|validation| validation.validated_at)
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_owned()).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::audit::InMemoryAuditSink;
    use crate::domain::document::DocumentId;
    use crate::domain::user::UserId;
    use crate::domain::validation::{
        DocumentValidationStatus, ValidationRequest, ValidationRequestStatus,
    };
    use crate::workflow::engine::{NewValidationRequest, ValidationEngine, WorkflowError};
    use crate::workflow::policy::{QuorumTolerant, RejectionPolicy};
    use crate::workflow::states::{WorkflowCommand, WorkflowContext, WorkflowEvent};

    fn user(id: &str) -> UserId {
        UserId(id.to_owned())
    }

    fn as_user(id: &str) -> WorkflowContext {
        WorkflowContext::new(user(id), "req-test")
    }

    fn open_request(
        engine: &ValidationEngine<RejectionPolicy>,
        min_validations: u32,
        validators: &[&str],
    ) -> ValidationRequest {
        let mut request = engine
            .open(
                NewValidationRequest {
                    document_id: DocumentId("DOC-1".to_owned()),
                    requester_id: user("requester"),
                    min_validations,
                    description: Some("  Please review  ".to_owned()),
                    due_date: None,
                },
                &as_user("requester"),
            )
            .expect("open request");
        let validators: Vec<UserId> = validators.iter().map(|id| user(id)).collect();
        engine
            .add_validators(&mut request, &validators, &as_user("requester"))
            .expect("assign validators");
        request
    }

    fn requester_notices(events: &[WorkflowEvent]) -> usize {
        events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    WorkflowEvent::RequestApproved { .. } | WorkflowEvent::RequestRejected { .. }
                )
            })
            .count()
    }

    #[test]
    fn open_rejects_zero_quorum() {
        let engine = ValidationEngine::default();
        let error = engine
            .open(
                NewValidationRequest {
                    document_id: DocumentId("DOC-1".to_owned()),
                    requester_id: user("requester"),
                    min_validations: 0,
                    description: None,
                    due_date: None,
                },
                &as_user("requester"),
            )
            .expect_err("zero quorum must fail");

        assert_eq!(error, WorkflowError::InvalidQuorum { min_validations: 0 });
    }

    #[test]
    fn two_of_three_approvals_complete_the_request_and_notify_once() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 2, &["a", "b", "c"]);
        assert_eq!(request.description.as_deref(), Some("Please review"));
        let mut events = Vec::new();

        let first = engine.approve(&mut request, None, &as_user("a")).expect("a approves");
        assert_eq!(first.to, ValidationRequestStatus::Pending);
        assert!(!first.transitioned());
        events.extend(first.events);

        let second = engine
            .approve(&mut request, Some("I agree".to_owned()), &as_user("b"))
            .expect("b approves");
        assert_eq!(second.from, ValidationRequestStatus::Pending);
        assert_eq!(second.to, ValidationRequestStatus::Approved);
        events.extend(second.events);

        assert_eq!(request.status, ValidationRequestStatus::Approved);
        assert!(request.completed_at.is_some());
        assert_eq!(requester_notices(&events), 1);

        let progress = request.validation_progress();
        assert_eq!(progress.approved, 2);
        assert_eq!(progress.pending, 1);
        assert_eq!(progress.rejected, 0);
        assert_eq!(progress.total_validators, 3);
        assert_eq!(progress.min_required, 2);
    }

    #[test]
    fn single_rejection_overrides_prior_approvals() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 3, &["a", "b", "c", "d"]);

        engine.approve(&mut request, None, &as_user("a")).expect("a approves");
        engine.approve(&mut request, None, &as_user("b")).expect("b approves");
        let outcome = engine
            .reject(&mut request, Some("Major issues".to_owned()), &as_user("c"))
            .expect("c rejects");

        assert_eq!(outcome.to, ValidationRequestStatus::Rejected);
        assert!(request.completed_at.is_some());
        assert!(request.has_rejection());
        assert_eq!(request.rejecting_validators(), vec![&user("c")]);
        assert!(outcome.events.iter().any(|event| matches!(
            event,
            WorkflowEvent::RequestRejected { rejected_by: Some(by), comment: Some(comment), .. }
                if by == &user("c") && comment == "Major issues"
        )));
    }

    #[test]
    fn rejection_requires_comment() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 1, &["a"]);

        let error = engine
            .reject(&mut request, Some("   ".to_owned()), &as_user("a"))
            .expect_err("blank comment must fail");

        assert_eq!(error, WorkflowError::CommentRequired);
        assert_eq!(
            request.validation_for(&user("a")).map(|validation| validation.status),
            Some(DocumentValidationStatus::Pending)
        );
    }

    #[test]
    fn duplicate_assignment_fails_without_partial_changes() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 1, &["a", "b"]);

        let error = engine
            .add_validators(&mut request, &[user("c"), user("a")], &as_user("requester"))
            .expect_err("a is already assigned");

        assert!(matches!(error, WorkflowError::DuplicateValidator { ref validator_id, .. }
            if validator_id == &user("a")));
        assert_eq!(request.validations.len(), 2);
    }

    #[test]
    fn repeated_validators_in_one_call_are_collapsed() {
        let engine = ValidationEngine::default();
        let request = open_request(&engine, 1, &["a", "a", "b"]);

        assert_eq!(request.validations.len(), 2);
    }

    #[test]
    fn adding_validators_after_verdict_fails() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 1, &["a"]);
        engine.approve(&mut request, None, &as_user("a")).expect("a approves");

        let error = engine
            .add_validators(&mut request, &[user("b")], &as_user("requester"))
            .expect_err("approved request is closed");

        assert!(matches!(
            error,
            WorkflowError::NotPending { status: ValidationRequestStatus::Approved, .. }
        ));
    }

    #[test]
    fn late_approval_leaves_verdict_unchanged() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 3, &["a", "b", "c", "d"]);
        for validator in ["a", "b", "c"] {
            engine.approve(&mut request, None, &as_user(validator)).expect("approve");
        }
        let completed_at = request.completed_at;
        assert_eq!(request.status, ValidationRequestStatus::Approved);

        let late = engine
            .approve(&mut request, None, &as_user("d").at(Utc::now() + Duration::minutes(5)))
            .expect("late approval is recorded");

        assert_eq!(late.from, ValidationRequestStatus::Approved);
        assert_eq!(late.to, ValidationRequestStatus::Approved);
        assert_eq!(requester_notices(&late.events), 0);
        assert_eq!(request.completed_at, completed_at);
        assert_eq!(request.validation_progress().percentage, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn validators_cannot_decide_twice() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 2, &["a", "b"]);
        engine.approve(&mut request, None, &as_user("a")).expect("a approves");

        let error = engine
            .reject(&mut request, Some("changed my mind".to_owned()), &as_user("a"))
            .expect_err("a already approved");

        assert!(matches!(
            error,
            WorkflowError::AlreadyDecided { status: DocumentValidationStatus::Approved, .. }
        ));
    }

    #[test]
    fn unassigned_users_cannot_decide() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 1, &["a"]);

        let error = engine
            .approve(&mut request, None, &as_user("stranger"))
            .expect_err("stranger is not assigned");

        assert!(matches!(error, WorkflowError::NotAssigned { .. }));
    }

    #[test]
    fn check_completion_is_idempotent() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 1, &["a", "b"]);
        engine.approve(&mut request, None, &as_user("a")).expect("a approves");
        let snapshot = request.clone();

        let outcome = engine.check_completion(&mut request, &as_user("scheduler"));

        assert!(outcome.events.is_empty());
        assert_eq!(request, snapshot);
    }

    #[test]
    fn cancel_closes_pending_request_and_lists_waiting_validators() {
        let engine = ValidationEngine::default();
        let mut request = open_request(&engine, 2, &["a", "b"]);
        engine.approve(&mut request, None, &as_user("a")).expect("a approves");

        let outcome = engine
            .cancel(&mut request, Some("No longer needed".to_owned()), &as_user("requester"))
            .expect("cancel pending request");

        assert_eq!(outcome.to, ValidationRequestStatus::Rejected);
        assert!(request.completed_at.is_some());
        assert!(matches!(
            outcome.events.as_slice(),
            [WorkflowEvent::RequestCancelled { pending_validators, .. }]
                if pending_validators == &vec![user("b")]
        ));

        let error = engine
            .cancel(&mut request, None, &as_user("requester"))
            .expect_err("cannot cancel twice");
        assert!(matches!(error, WorkflowError::NotPending { .. }));
    }

    #[test]
    fn quorum_tolerant_policy_survives_minority_rejection() {
        let engine = ValidationEngine::new(QuorumTolerant);
        let mut request = engine
            .open(
                NewValidationRequest {
                    document_id: DocumentId("DOC-1".to_owned()),
                    requester_id: user("requester"),
                    min_validations: 2,
                    description: None,
                    due_date: None,
                },
                &as_user("requester"),
            )
            .expect("open");
        engine
            .add_validators(&mut request, &[user("a"), user("b"), user("c")], &as_user("requester"))
            .expect("assign");

        engine.reject(&mut request, Some("typo".to_owned()), &as_user("a")).expect("a rejects");
        assert_eq!(request.status, ValidationRequestStatus::Pending);

        engine.approve(&mut request, None, &as_user("b")).expect("b approves");
        engine.approve(&mut request, None, &as_user("c")).expect("c approves");
        assert_eq!(request.status, ValidationRequestStatus::Approved);
    }

    #[test]
    fn audited_apply_records_success_and_rejection() {
        let engine = ValidationEngine::default();
        let sink = InMemoryAuditSink::default();
        let mut request = open_request(&engine, 1, &["a"]);

        engine
            .apply_with_audit(
                &mut request,
                &WorkflowCommand::Approve { comment: None },
                &as_user("a"),
                &sink,
            )
            .expect("approve");
        let _ = engine.apply_with_audit(
            &mut request,
            &WorkflowCommand::AddValidators { validators: vec![user("b")] },
            &as_user("requester"),
            &sink,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "validation.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("approved"));
        assert_eq!(events[1].event_type, "validation.transition_rejected");
        assert_eq!(events[1].correlation_id, "req-test");
    }
}
