use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::document::DocumentId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationId(pub String);

/// Ordered from weakest to strongest; a grant satisfies every level below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Read,
    Write,
    Validate,
    Admin,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Validate => "validate",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "validate" => Some(Self::Validate),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn satisfies(&self, required: PermissionLevel) -> bool {
        *self >= required
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub permission_level: PermissionLevel,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub comment: Option<String>,
    pub revoked_by: Option<UserId>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Authorization {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// Returns false if the grant was already revoked.
    pub fn revoke(&mut self, revoked_by: UserId, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.revoked_by = Some(revoked_by);
        self.revoked_at = Some(now);
        true
    }

    pub fn grants(&self, user_id: &UserId, required: PermissionLevel) -> bool {
        self.is_active() && &self.user_id == user_id && self.permission_level.satisfies(required)
    }
}
