use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DocumentValidationRequested,
    DocumentValidationApproved,
    DocumentValidationRejected,
    DocumentValidationReminder,
    DocumentShared,
    DocumentProcessingCompleted,
    DocumentProcessingFailed,
    AuthorizationGranted,
    AuthorizationRevoked,
    ProjectTaskAssigned,
    ProjectTaskOverdue,
    BudgetExceeded,
    RiskIdentified,
    SystemAnnouncement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Documents,
    Projects,
    Budgets,
    Risks,
    System,
}

impl NotificationCategory {
    pub const ALL: [NotificationCategory; 5] =
        [Self::Documents, Self::Projects, Self::Budgets, Self::Risks, Self::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Projects => "projects",
            Self::Budgets => "budgets",
            Self::Risks => "risks",
            Self::System => "system",
        }
    }
}

impl NotificationType {
    pub const ALL: [NotificationType; 14] = [
        Self::DocumentValidationRequested,
        Self::DocumentValidationApproved,
        Self::DocumentValidationRejected,
        Self::DocumentValidationReminder,
        Self::DocumentShared,
        Self::DocumentProcessingCompleted,
        Self::DocumentProcessingFailed,
        Self::AuthorizationGranted,
        Self::AuthorizationRevoked,
        Self::ProjectTaskAssigned,
        Self::ProjectTaskOverdue,
        Self::BudgetExceeded,
        Self::RiskIdentified,
        Self::SystemAnnouncement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentValidationRequested => "document_validation_requested",
            Self::DocumentValidationApproved => "document_validation_approved",
            Self::DocumentValidationRejected => "document_validation_rejected",
            Self::DocumentValidationReminder => "document_validation_reminder",
            Self::DocumentShared => "document_shared",
            Self::DocumentProcessingCompleted => "document_processing_completed",
            Self::DocumentProcessingFailed => "document_processing_failed",
            Self::AuthorizationGranted => "authorization_granted",
            Self::AuthorizationRevoked => "authorization_revoked",
            Self::ProjectTaskAssigned => "project_task_assigned",
            Self::ProjectTaskOverdue => "project_task_overdue",
            Self::BudgetExceeded => "budget_exceeded",
            Self::RiskIdentified => "risk_identified",
            Self::SystemAnnouncement => "system_announcement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            Self::DocumentValidationRequested
            | Self::DocumentValidationApproved
            | Self::DocumentValidationRejected
            | Self::DocumentValidationReminder
            | Self::DocumentShared
            | Self::DocumentProcessingCompleted
            | Self::DocumentProcessingFailed
            | Self::AuthorizationGranted
            | Self::AuthorizationRevoked => NotificationCategory::Documents,
            Self::ProjectTaskAssigned | Self::ProjectTaskOverdue => NotificationCategory::Projects,
            Self::BudgetExceeded => NotificationCategory::Budgets,
            Self::RiskIdentified => NotificationCategory::Risks,
            Self::SystemAnnouncement => NotificationCategory::System,
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::BudgetExceeded | Self::ProjectTaskOverdue | Self::RiskIdentified)
    }

    pub fn in_category(category: NotificationCategory) -> Vec<NotificationType> {
        Self::ALL.into_iter().filter(|kind| kind.category() == category).collect()
    }

    /// "document_validation_requested" -> "Document validation requested"
    pub fn display_name(&self) -> String {
        let words = self.as_str().replace('_', " ");
        let mut chars = words.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn default_delivery_method(&self) -> DeliveryMethod {
        DeliveryMethod::Both
    }

    pub fn default_frequency(&self) -> Frequency {
        if self.is_urgent() {
            return Frequency::Immediate;
        }
        match self {
            Self::ProjectTaskAssigned
            | Self::DocumentValidationRequested
            | Self::DocumentValidationApproved
            | Self::DocumentValidationRejected => Frequency::Immediate,
            _ => Frequency::DailyDigest,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    InApp,
    Email,
    Both,
    Disabled,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InApp => "in_app",
            Self::Email => "email",
            Self::Both => "both",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_app" => Some(Self::InApp),
            "email" => Some(Self::Email),
            "both" => Some(Self::Both),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn includes_in_app(&self) -> bool {
        matches!(self, Self::InApp | Self::Both)
    }

    pub fn includes_email(&self) -> bool {
        matches!(self, Self::Email | Self::Both)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Immediate,
    DailyDigest,
    WeeklyDigest,
    Disabled,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::DailyDigest => "daily_digest",
            Self::WeeklyDigest => "weekly_digest",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "immediate" => Some(Self::Immediate),
            "daily_digest" => Some(Self::DailyDigest),
            "weekly_digest" => Some(Self::WeeklyDigest),
            "disabled" | "disabled_frequency" => Some(Self::Disabled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotificationPreference {
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub delivery_method: DeliveryMethod,
    pub frequency: Frequency,
    pub enabled: bool,
}

impl UserNotificationPreference {
    pub fn default_for(user_id: UserId, notification_type: NotificationType) -> Self {
        Self {
            user_id,
            notification_type,
            delivery_method: notification_type.default_delivery_method(),
            frequency: notification_type.default_frequency(),
            enabled: true,
        }
    }

    pub fn defaults_for_user(user_id: &UserId) -> Vec<Self> {
        NotificationType::ALL
            .into_iter()
            .map(|notification_type| Self::default_for(user_id.clone(), notification_type))
            .collect()
    }

    pub fn should_deliver_in_app(&self) -> bool {
        self.enabled && self.delivery_method.includes_in_app()
    }

    pub fn should_deliver_email(&self) -> bool {
        self.enabled && self.delivery_method.includes_email()
    }

    /// Urgent types bypass digests.
    pub fn should_deliver_immediately(&self) -> bool {
        self.notification_type.is_urgent() || self.frequency == Frequency::Immediate
    }

    pub fn suppresses_delivery(&self) -> bool {
        !self.should_deliver_in_app() && !self.should_deliver_email()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeliveryChannels {
    pub in_app: bool,
    pub email: bool,
}

/// The record a notification is about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notifiable {
    pub kind: String,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub notifiable: Option<Notifiable>,
    pub data: Map<String, Value>,
    pub channels: DeliveryChannels,
    pub frequency: Frequency,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn is_urgent(&self) -> bool {
        self.notification_type.is_urgent()
    }

    pub fn category(&self) -> NotificationCategory {
        self.notification_type.category()
    }

    /// Returns false when the notification was already read; the first read
    /// timestamp is kept.
    pub fn mark_as_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.read_at.is_some() {
            return false;
        }
        self.read_at = Some(now);
        true
    }
}
