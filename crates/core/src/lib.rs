pub mod access;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod history;
pub mod notifications;
pub mod workflow;

pub use access::{DocumentAccess, DocumentContainer};
pub use domain::authorization::{Authorization, AuthorizationId, PermissionLevel};
pub use domain::document::{Container, Document, DocumentId, DocumentStatus};
pub use domain::notification::{
    DeliveryMethod, Frequency, Notification, NotificationId, NotificationType,
    UserNotificationPreference,
};
pub use domain::user::{OrganizationId, User, UserId};
pub use domain::validation::{
    DocumentValidation, DocumentValidationStatus, ValidationProgress, ValidationRequest,
    ValidationRequestId, ValidationRequestStatus,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use history::ValidationHistory;
pub use notifications::{DispatchContext, NotificationDispatcher};
pub use workflow::{
    NewValidationRequest, RejectionPolicy, ValidationEngine, WorkflowCommand, WorkflowContext,
    WorkflowError, WorkflowEvent, WorkflowOutcome,
};
