use crate::domain::document::Document;
use crate::domain::validation::{ValidationRequest, ValidationRequestStatus};
use crate::errors::DomainError;

/// A document's validation requests, newest first.
#[derive(Clone, Debug)]
pub struct ValidationHistory<'a> {
    document: &'a Document,
    requests: Vec<&'a ValidationRequest>,
}

impl<'a> ValidationHistory<'a> {
    /// Requests belonging to other documents are ignored.
    pub fn new(document: &'a Document, requests: &'a [ValidationRequest]) -> Self {
        let mut requests: Vec<_> =
            requests.iter().filter(|request| request.document_id == document.id).collect();
        requests.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
        });
        Self { document, requests }
    }

    pub fn validation_history(&self) -> &[&'a ValidationRequest] {
        &self.requests
    }

    pub fn current_validation_request(&self) -> Option<&'a ValidationRequest> {
        self.requests.iter().copied().find(|request| request.is_pending())
    }

    pub fn validation_pending(&self) -> bool {
        self.current_validation_request().is_some()
    }

    /// Status of the latest request, `None` when validation was never requested.
    pub fn validation_status(&self) -> Option<ValidationRequestStatus> {
        self.requests.first().map(|request| request.status)
    }

    /// The latest request was approved and the document has not changed since.
    pub fn validated(&self) -> bool {
        self.requests.first().is_some_and(|request| {
            request.status == ValidationRequestStatus::Approved
                && request
                    .completed_at
                    .is_some_and(|completed_at| completed_at >= self.document.updated_at)
        })
    }

    /// Gate for opening a new request on the document.
    pub fn ensure_can_request(&self) -> Result<(), DomainError> {
        if !self.document.status.accepts_validation() {
            return Err(DomainError::DocumentNotValidatable {
                document_id: self.document.id.0.clone(),
                status: self.document.status.as_str().to_owned(),
            });
        }
        if self.validation_pending() {
            return Err(DomainError::ValidationAlreadyPending {
                document_id: self.document.id.0.clone(),
            });
        }
        Ok(())
    }
}

pub fn status_label(status: Option<ValidationRequestStatus>) -> &'static str {
    status.map(|status| status.as_str()).unwrap_or("none")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{status_label, ValidationHistory};
    use crate::domain::document::{Container, Document, DocumentId, DocumentStatus};
    use crate::domain::user::{OrganizationId, UserId};
    use crate::domain::validation::{
        ValidationRequest, ValidationRequestId, ValidationRequestStatus,
    };
    use crate::errors::DomainError;

    fn document(status: DocumentStatus) -> Document {
        Document {
            id: DocumentId("DOC-1".to_owned()),
            title: "Contract".to_owned(),
            status,
            uploaded_by: UserId("owner".to_owned()),
            container: Container::Space {
                id: "space-1".to_owned(),
                organization_id: OrganizationId("org-1".to_owned()),
            },
            created_at: Utc::now() - Duration::days(10),
            updated_at: Utc::now() - Duration::days(5),
        }
    }

    fn request(id: &str, age_days: i64, status: ValidationRequestStatus) -> ValidationRequest {
        let created_at = Utc::now() - Duration::days(age_days);
        ValidationRequest {
            id: ValidationRequestId(id.to_owned()),
            document_id: DocumentId("DOC-1".to_owned()),
            requester_id: UserId("owner".to_owned()),
            min_validations: 1,
            status,
            description: None,
            due_date: None,
            created_at,
            updated_at: created_at,
            completed_at: status.is_terminal().then(|| created_at + Duration::hours(1)),
            version: 0,
            validations: Vec::new(),
        }
    }

    #[test]
    fn empty_history_reports_none() {
        let document = document(DocumentStatus::Published);
        let history = ValidationHistory::new(&document, &[]);

        assert_eq!(status_label(history.validation_status()), "none");
        assert!(!history.validation_pending());
        assert!(!history.validated());
        assert!(history.ensure_can_request().is_ok());
    }

    #[test]
    fn latest_request_drives_status_and_pending_blocks_new_requests() {
        let document = document(DocumentStatus::Published);
        let requests = vec![
            request("VR-old", 8, ValidationRequestStatus::Rejected),
            request("VR-new", 1, ValidationRequestStatus::Pending),
        ];
        let history = ValidationHistory::new(&document, &requests);

        assert_eq!(history.validation_history()[0].id.0, "VR-new");
        assert_eq!(history.validation_status(), Some(ValidationRequestStatus::Pending));
        assert_eq!(
            history.current_validation_request().map(|request| request.id.0.as_str()),
            Some("VR-new")
        );
        assert!(matches!(
            history.ensure_can_request(),
            Err(DomainError::ValidationAlreadyPending { .. })
        ));
    }

    #[test]
    fn approval_older_than_last_edit_is_not_validated() {
        let document = document(DocumentStatus::Published);
        let stale = vec![request("VR-1", 7, ValidationRequestStatus::Approved)];
        assert!(!ValidationHistory::new(&document, &stale).validated());

        let fresh = vec![request("VR-2", 2, ValidationRequestStatus::Approved)];
        assert!(ValidationHistory::new(&document, &fresh).validated());
    }

    #[test]
    fn archived_documents_cannot_be_submitted() {
        let document = document(DocumentStatus::Archived);
        let history = ValidationHistory::new(&document, &[]);

        assert!(matches!(
            history.ensure_can_request(),
            Err(DomainError::DocumentNotValidatable { .. })
        ));
    }
}
