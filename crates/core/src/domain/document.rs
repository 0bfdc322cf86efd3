use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::{OrganizationId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Published,
    Locked,
    Archived,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Locked => "locked",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "locked" => Some(Self::Locked),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Archived and deleted documents are frozen for review purposes.
    pub fn accepts_validation(&self) -> bool {
        !matches!(self, Self::Archived | Self::Deleted)
    }
}

/// Where a document lives. Each container kind answers the document
/// capability questions for itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Container {
    Space { id: String, organization_id: OrganizationId },
    Project { id: String, organization_id: OrganizationId, manager_id: UserId },
}

impl Container {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Space { .. } => "space",
            Self::Project { .. } => "project",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Space { id, .. } | Self::Project { id, .. } => id,
        }
    }

    pub fn organization_id(&self) -> &OrganizationId {
        match self {
            Self::Space { organization_id, .. } | Self::Project { organization_id, .. } => {
                organization_id
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub status: DocumentStatus,
    pub uploaded_by: UserId,
    pub container: Container,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.uploaded_by == user_id
    }
}
