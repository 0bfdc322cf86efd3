use serde::{Deserialize, Serialize};

use crate::domain::validation::{DocumentValidationStatus, ValidationRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationTally {
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
    pub min_required: u32,
}

impl ValidationTally {
    pub fn of(request: &ValidationRequest) -> Self {
        Self {
            approved: request.count_with_status(DocumentValidationStatus::Approved),
            rejected: request.count_with_status(DocumentValidationStatus::Rejected),
            pending: request.count_with_status(DocumentValidationStatus::Pending),
            min_required: request.min_validations,
        }
    }

    pub fn quorum_reached(&self) -> bool {
        self.approved >= self.min_required as usize
    }

    /// Whether the outstanding validators could still carry the request to
    /// its quorum.
    pub fn quorum_reachable(&self) -> bool {
        self.approved + self.pending >= self.min_required as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Rejected,
}

/// Decides whether a pending request has reached a verdict. Implementations
/// must be pure functions of the tally so recomputation stays idempotent.
pub trait CompletionPolicy {
    fn name(&self) -> &'static str;
    fn evaluate(&self, tally: &ValidationTally) -> Option<Verdict>;
}

/// A single rejection settles the request regardless of approvals.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbsoluteRejection;

impl CompletionPolicy for AbsoluteRejection {
    fn name(&self) -> &'static str {
        "absolute"
    }

    fn evaluate(&self, tally: &ValidationTally) -> Option<Verdict> {
        if tally.rejected > 0 {
            return Some(Verdict::Rejected);
        }
        tally.quorum_reached().then_some(Verdict::Approved)
    }
}

/// Rejections only settle the request once the quorum is out of reach.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuorumTolerant;

impl CompletionPolicy for QuorumTolerant {
    fn name(&self) -> &'static str {
        "quorum_tolerant"
    }

    fn evaluate(&self, tally: &ValidationTally) -> Option<Verdict> {
        if tally.quorum_reached() {
            return Some(Verdict::Approved);
        }
        if tally.rejected > 0 && !tally.quorum_reachable() {
            return Some(Verdict::Rejected);
        }
        None
    }
}

/// Configuration-selectable policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    #[default]
    Absolute,
    QuorumTolerant,
}

impl RejectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absolute => AbsoluteRejection.name(),
            Self::QuorumTolerant => QuorumTolerant.name(),
        }
    }
}

impl std::str::FromStr for RejectionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "absolute" => Ok(Self::Absolute),
            "quorum_tolerant" | "quorum-tolerant" => Ok(Self::QuorumTolerant),
            other => Err(format!(
                "unsupported rejection policy `{other}` (expected absolute|quorum_tolerant)"
            )),
        }
    }
}

impl CompletionPolicy for RejectionPolicy {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn evaluate(&self, tally: &ValidationTally) -> Option<Verdict> {
        match self {
            Self::Absolute => AbsoluteRejection.evaluate(tally),
            Self::QuorumTolerant => QuorumTolerant.evaluate(tally),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AbsoluteRejection, CompletionPolicy, QuorumTolerant, RejectionPolicy, ValidationTally,
        Verdict,
    };

    fn tally(
        approved: usize,
        rejected: usize,
        pending: usize,
        min_required: u32,
    ) -> ValidationTally {
        ValidationTally { approved, rejected, pending, min_required }
    }

    #[test]
    fn absolute_rejection_overrides_approvals() {
        assert_eq!(AbsoluteRejection.evaluate(&tally(2, 1, 0, 3)), Some(Verdict::Rejected));
        assert_eq!(AbsoluteRejection.evaluate(&tally(5, 1, 0, 3)), Some(Verdict::Rejected));
    }

    #[test]
    fn absolute_approves_once_quorum_is_met() {
        assert_eq!(AbsoluteRejection.evaluate(&tally(1, 0, 2, 2)), None);
        assert_eq!(AbsoluteRejection.evaluate(&tally(2, 0, 1, 2)), Some(Verdict::Approved));
    }

    #[test]
    fn absolute_without_validators_has_no_verdict() {
        assert_eq!(AbsoluteRejection.evaluate(&tally(0, 0, 0, 1)), None);
    }

    #[test]
    fn quorum_tolerant_ignores_minority_rejection() {
        assert_eq!(QuorumTolerant.evaluate(&tally(1, 1, 2, 2)), None);
        assert_eq!(QuorumTolerant.evaluate(&tally(2, 1, 1, 2)), Some(Verdict::Approved));
    }

    #[test]
    fn quorum_tolerant_rejects_when_quorum_is_unreachable() {
        assert_eq!(QuorumTolerant.evaluate(&tally(1, 2, 0, 2)), Some(Verdict::Rejected));
    }

    #[test]
    fn rejection_policy_parses_config_values() {
        assert_eq!("absolute".parse::<RejectionPolicy>(), Ok(RejectionPolicy::Absolute));
        assert_eq!(
            "Quorum-Tolerant".parse::<RejectionPolicy>(),
            Ok(RejectionPolicy::QuorumTolerant)
        );
        assert!("majority".parse::<RejectionPolicy>().is_err());
        assert_eq!(RejectionPolicy::default().name(), "absolute");
    }
}
