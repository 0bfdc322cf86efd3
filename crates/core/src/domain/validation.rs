use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::document::DocumentId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationRequestId(pub String);

impl fmt::Display for ValidationRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentValidationId(pub String);

/// Aggregate status. `Approved` is the only terminal-success value; rows
/// written as `completed` by older deployments decode to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ValidationRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ValidationRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" | "completed" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentValidationStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for DocumentValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DocumentValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentValidation {
    pub id: DocumentValidationId,
    pub validation_request_id: ValidationRequestId,
    pub validator_id: UserId,
    pub status: DocumentValidationStatus,
    pub comment: Option<String>,
    pub validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DocumentValidation {
    pub fn is_pending(&self) -> bool {
        self.status == DocumentValidationStatus::Pending
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub id: ValidationRequestId,
    pub document_id: DocumentId,
    pub requester_id: UserId,
    pub min_validations: u32,
    pub status: ValidationRequestStatus,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Store revision this copy was loaded at. Saving a copy older than the
    /// stored one is refused.
    #[serde(default)]
    pub version: u32,
    pub validations: Vec<DocumentValidation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProgress {
    pub total_validators: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub min_required: u32,
    pub percentage: Decimal,
}

impl ValidationRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ValidationRequestStatus::Pending
    }

    pub fn validation_for(&self, validator_id: &UserId) -> Option<&DocumentValidation> {
        self.validations.iter().find(|validation| &validation.validator_id == validator_id)
    }

    pub fn validators(&self) -> impl Iterator<Item = &UserId> {
        self.validations.iter().map(|validation| &validation.validator_id)
    }

    pub fn pending_validators(&self) -> impl Iterator<Item = &UserId> {
        self.validations
            .iter()
            .filter(|validation| validation.is_pending())
            .map(|validation| &validation.validator_id)
    }

    pub fn count_with_status(&self, status: DocumentValidationStatus) -> usize {
        self.validations.iter().filter(|validation| validation.status == status).count()
    }

    pub fn has_rejection(&self) -> bool {
        self.count_with_status(DocumentValidationStatus::Rejected) > 0
    }

    pub fn rejecting_validators(&self) -> Vec<&UserId> {
        self.validations
            .iter()
            .filter(|validation| validation.status == DocumentValidationStatus::Rejected)
            .map(|validation| &validation.validator_id)
            .collect()
    }

    /// A request without validators can never reach a verdict.
    pub fn can_be_completed(&self) -> bool {
        self.is_pending() && !self.validations.is_empty()
    }

    pub fn can_be_validated_by(&self, user_id: &UserId) -> bool {
        self.is_pending()
            && self.validation_for(user_id).map(DocumentValidation::is_pending).unwrap_or(false)
    }

    pub fn validation_progress(&self) -> ValidationProgress {
        let total = self.validations.len();
        let approved = self.count_with_status(DocumentValidationStatus::Approved);
        let rejected = self.count_with_status(DocumentValidationStatus::Rejected);
        let pending = self.count_with_status(DocumentValidationStatus::Pending);

        let percentage = if total == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from((approved + rejected) as u64) * Decimal::ONE_HUNDRED
                / Decimal::from(total as u64))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        };

        ValidationProgress {
            total_validators: total,
            pending,
            approved,
            rejected,
            min_required: self.min_validations,
            percentage,
        }
    }
}
