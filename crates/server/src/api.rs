//! JSON API over [`ValidationService`].
//!
//! Every call names its actor in `x-actor-id`; `x-correlation-id` is
//! optional and echoed back on errors. Session handling lives in front of
//! this service.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use docusphere_core::domain::document::DocumentId;
use docusphere_core::domain::notification::{
    DeliveryMethod, Frequency, Notification, NotificationId, NotificationType,
    UserNotificationPreference,
};
use docusphere_core::domain::user::UserId;
use docusphere_core::domain::validation::{
    ValidationProgress, ValidationRequest, ValidationRequestId,
};
use docusphere_core::errors::{ApplicationError, InterfaceError};
use docusphere_core::workflow::WorkflowContext;
use docusphere_db::{
    DocumentValidationSummary, TransitionReceipt, ValidationRequestDraft, ValidationService,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

pub const ACTOR_HEADER: &str = "x-actor-id";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(service: Arc<ValidationService>) -> Router {
    Router::new()
        .route("/documents/{document_id}/validation-requests", post(request_validation))
        .route("/documents/{document_id}/validation", get(document_summary))
        .route("/validation-requests/{request_id}", get(get_request))
        .route("/validation-requests/{request_id}/progress", get(progress))
        .route("/validation-requests/{request_id}/validators", post(add_validators))
        .route("/validation-requests/{request_id}/approve", post(approve))
        .route("/validation-requests/{request_id}/reject", post(reject))
        .route("/validation-requests/{request_id}/cancel", post(cancel))
        .route("/validation-requests/{request_id}/check-completion", post(check_completion))
        .route("/me/awaiting-validation", get(awaiting_my_validation))
        .route("/me/validation-requests", get(my_requests))
        .route("/me/validations", get(my_validations))
        .route("/users/{user_id}/notifications", get(list_notifications))
        .route("/users/{user_id}/notifications/read-all", post(mark_all_read))
        .route(
            "/users/{user_id}/notification-preferences",
            get(list_preferences).put(update_preference),
        )
        .route("/notifications/{notification_id}/read", post(mark_read))
        .with_state(service)
}

/// Actor and correlation id of one HTTP call.
pub struct RequestContext(pub WorkflowContext);

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        let correlation_id =
            header(CORRELATION_HEADER).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let Some(actor) = header(ACTOR_HEADER) else {
            return Err(ApiError(InterfaceError::BadRequest {
                message: format!("missing `{ACTOR_HEADER}` header"),
                correlation_id,
            }));
        };

        Ok(Self(WorkflowContext::new(UserId(actor), correlation_id)))
    }
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn from_application(error: ApplicationError, context: &WorkflowContext) -> Self {
        Self(error.into_interface(context.correlation_id.clone()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Server-side failure text stays in the log.
        let detail = if status.is_server_error() {
            error!(
                event_name = "api.request_failed",
                correlation_id = self.0.correlation_id(),
                status = status.as_u16(),
                error = self.0.message(),
                "request failed"
            );
            None
        } else {
            debug!(
                event_name = "api.request_refused",
                correlation_id = self.0.correlation_id(),
                status = status.as_u16(),
                error = self.0.message(),
                "request refused"
            );
            Some(self.0.message().to_owned())
        };

        let body = json!({
            "error": self.0.user_message(),
            "detail": detail,
            "correlation_id": self.0.correlation_id(),
        });
        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(self.0.correlation_id()) {
            response.headers_mut().insert(CORRELATION_HEADER, value);
        }
        response
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RequestValidationBody {
    pub validators: Vec<UserId>,
    pub min_validations: Option<u32>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AddValidatorsBody {
    pub validators: Vec<UserId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DecisionBody {
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CancelBody {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotificationsQuery {
    pub unread: bool,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceBody {
    pub notification_type: NotificationType,
    pub delivery_method: DeliveryMethod,
    pub frequency: Frequency,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

async fn request_validation(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(document_id): Path<String>,
    Json(body): Json<RequestValidationBody>,
) -> Result<(StatusCode, Json<TransitionReceipt>), ApiError> {
    let draft = ValidationRequestDraft {
        validators: body.validators,
        min_validations: body.min_validations,
        description: body.description,
        due_date: body.due_date,
    };
    let receipt = service
        .request_validation(&DocumentId(document_id), draft, &ctx)
        .await
        .map_err(|error| ApiError::from_application(error, &ctx))?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn document_summary(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(document_id): Path<String>,
) -> ApiResult<DocumentValidationSummary> {
    service
        .document_summary(&DocumentId(document_id), &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn get_request(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(request_id): Path<String>,
) -> ApiResult<ValidationRequest> {
    service
        .get_request(&ValidationRequestId(request_id), &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn progress(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(request_id): Path<String>,
) -> ApiResult<ValidationProgress> {
    service
        .progress(&ValidationRequestId(request_id), &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn add_validators(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(request_id): Path<String>,
    Json(body): Json<AddValidatorsBody>,
) -> ApiResult<TransitionReceipt> {
    service
        .add_validators(&ValidationRequestId(request_id), &body.validators, &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn approve(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(request_id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<TransitionReceipt> {
    service
        .approve(&ValidationRequestId(request_id), body.comment, &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn reject(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(request_id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<TransitionReceipt> {
    service
        .reject(&ValidationRequestId(request_id), body.comment, &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn cancel(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(request_id): Path<String>,
    Json(body): Json<CancelBody>,
) -> ApiResult<TransitionReceipt> {
    service
        .cancel(&ValidationRequestId(request_id), body.reason, &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn check_completion(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(request_id): Path<String>,
) -> ApiResult<TransitionReceipt> {
    service
        .check_completion(&ValidationRequestId(request_id), &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn awaiting_my_validation(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
) -> ApiResult<Vec<ValidationRequest>> {
    service
        .awaiting_my_validation(&ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn my_requests(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
) -> ApiResult<Vec<ValidationRequest>> {
    service
        .my_requests(&ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn my_validations(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
) -> ApiResult<Vec<ValidationRequest>> {
    service
        .my_validations(&ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn list_notifications(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Query(query): Query<NotificationsQuery>,
) -> ApiResult<Vec<Notification>> {
    service
        .notifications(&UserId(user_id), query.unread, &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn mark_read(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(notification_id): Path<String>,
) -> ApiResult<Notification> {
    service
        .mark_notification_read(&NotificationId(notification_id), &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

/// The path must name the acting user.
async fn mark_all_read(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if ctx.actor.0 != user_id {
        return Err(ApiError(InterfaceError::Forbidden {
            message: format!("user `{}` cannot clear notifications of `{user_id}`", ctx.actor),
            correlation_id: ctx.correlation_id.clone(),
        }));
    }
    let marked = service
        .mark_all_notifications_read(&ctx)
        .await
        .map_err(|error| ApiError::from_application(error, &ctx))?;
    Ok(Json(json!({ "marked_read": marked })))
}

async fn list_preferences(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<UserNotificationPreference>> {
    service
        .notification_preferences(&UserId(user_id), &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

async fn update_preference(
    State(service): State<Arc<ValidationService>>,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<String>,
    Json(body): Json<PreferenceBody>,
) -> ApiResult<UserNotificationPreference> {
    let preference = UserNotificationPreference {
        user_id: UserId(user_id),
        notification_type: body.notification_type,
        delivery_method: body.delivery_method,
        frequency: body.frequency,
        enabled: body.enabled,
    };
    service
        .update_notification_preference(preference, &ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use docusphere_core::domain::authorization::{
        Authorization, AuthorizationId, PermissionLevel,
    };
    use docusphere_core::domain::document::{Container, Document, DocumentId, DocumentStatus};
    use docusphere_core::domain::user::{OrganizationId, User, UserId};
    use docusphere_core::workflow::RejectionPolicy;
    use docusphere_db::{Repositories, ValidationService};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, CORRELATION_HEADER};

    const VALIDATORS: [&str; 3] = ["val-a", "val-b", "val-c"];

    async fn app() -> Router {
        let repositories = Repositories::in_memory();
        let mut users = vec!["owner", "stranger"];
        users.extend(VALIDATORS);
        for id in users {
            let organization = if id == "stranger" { "org-2" } else { "org-1" };
            repositories
                .users
                .save(User {
                    id: UserId(id.to_owned()),
                    full_name: format!("User {id}"),
                    email: format!("{id}@example.com"),
                    organization_id: OrganizationId(organization.to_owned()),
                    admin: false,
                })
                .await
                .expect("save user");
        }

        repositories
            .documents
            .save(Document {
                id: DocumentId("DOC-1".to_owned()),
                title: "Site survey".to_owned(),
                status: DocumentStatus::Published,
                uploaded_by: UserId("owner".to_owned()),
                container: Container::Space {
                    id: "space-1".to_owned(),
                    organization_id: OrganizationId("org-1".to_owned()),
                },
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .expect("save document");

        for (index, validator) in VALIDATORS.iter().enumerate() {
            repositories
                .authorizations
                .save(Authorization {
                    id: AuthorizationId(format!("AUTH-{index}")),
                    document_id: DocumentId("DOC-1".to_owned()),
                    user_id: UserId((*validator).to_owned()),
                    permission_level: PermissionLevel::Validate,
                    granted_by: UserId("owner".to_owned()),
                    granted_at: Utc::now(),
                    comment: None,
                    revoked_by: None,
                    revoked_at: None,
                })
                .await
                .expect("save grant");
        }

        router(Arc::new(ValidationService::new(repositories, RejectionPolicy::Absolute, 1)))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        actor: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header(CORRELATION_HEADER, "corr-test");
        if let Some(actor) = actor {
            builder = builder.header("x-actor-id", actor);
        }
        let body = body.map(|value| Body::from(value.to_string())).unwrap_or_else(Body::empty);
        let response =
            app.clone().oneshot(builder.body(body).expect("request")).await.expect("response");

        let status = response.status();
        let bytes =
            axum::body::to_bytes(response.into_body(), 1024 * 1024).await.expect("read body");
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, payload)
    }

    async fn open_request(app: &Router, validators: &[&str], min_validations: u32) -> String {
        let (status, payload) = call(
            app,
            "POST",
            "/documents/DOC-1/validation-requests",
            Some("owner"),
            Some(json!({ "validators": validators, "min_validations": min_validations })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{payload}");
        payload["request"]["id"].as_str().expect("request id").to_owned()
    }

    #[tokio::test]
    async fn missing_actor_header_is_a_bad_request() {
        let app = app().await;

        let (status, payload) =
            call(&app, "GET", "/documents/DOC-1/validation", None, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["correlation_id"], "corr-test");
        assert!(payload["detail"].as_str().unwrap_or_default().contains("x-actor-id"));
    }

    #[tokio::test]
    async fn quorum_of_approvals_approves_the_request() {
        let app = app().await;
        let id = open_request(&app, &["val-a", "val-b", "val-c"], 2).await;

        let (status, payload) = call(
            &app,
            "POST",
            &format!("/validation-requests/{id}/approve"),
            Some("val-a"),
            Some(json!({ "comment": "figures check out" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["request"]["status"], "pending");

        let (_, payload) =
            call(&app, "GET", &format!("/validation-requests/{id}/progress"), Some("owner"), None)
                .await;
        assert_eq!(payload["approved"], 1);
        assert_eq!(payload["pending"], 2);
        let percentage = payload["percentage"].as_str().expect("decimal is serialized as string");
        assert_eq!(Decimal::from_str(percentage).expect("decimal"), Decimal::new(333, 1));

        let (status, payload) = call(
            &app,
            "POST",
            &format!("/validation-requests/{id}/approve"),
            Some("val-b"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["request"]["status"], "approved");

        let (_, summary) =
            call(&app, "GET", "/documents/DOC-1/validation", Some("owner"), None).await;
        assert_eq!(summary["validation_status"], "approved");
        assert_eq!(summary["validated"], true);
    }

    #[tokio::test]
    async fn single_rejection_rejects_and_blocks_further_cancel() {
        let app = app().await;
        let id = open_request(&app, &["val-a", "val-b"], 1).await;

        let (status, payload) = call(
            &app,
            "POST",
            &format!("/validation-requests/{id}/reject"),
            Some("val-a"),
            Some(json!({ "comment": "wrong revision" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["request"]["status"], "rejected");

        let (status, _) = call(
            &app,
            "POST",
            &format!("/validation-requests/{id}/cancel"),
            Some("owner"),
            Some(json!({ "reason": "superseded" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unassigned_decision_and_unknown_request_map_to_client_errors() {
        let app = app().await;
        let id = open_request(&app, &["val-a"], 1).await;

        let (status, payload) = call(
            &app,
            "POST",
            &format!("/validation-requests/{id}/approve"),
            Some("val-c"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["detail"].as_str().unwrap_or_default().contains("val-c"));

        let (status, payload) =
            call(&app, "GET", "/validation-requests/VR-missing", Some("owner"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload["correlation_id"], "corr-test");
    }

    #[tokio::test]
    async fn other_organization_cannot_read_a_request() {
        let app = app().await;
        let id = open_request(&app, &["val-a"], 1).await;

        let (status, payload) =
            call(&app, "GET", &format!("/validation-requests/{id}"), Some("stranger"), None).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(payload["error"], "You are not allowed to perform this action.");
    }

    #[tokio::test]
    async fn validators_are_notified_and_can_clear_their_inbox() {
        let app = app().await;
        open_request(&app, &["val-a"], 1).await;

        let (status, inbox) =
            call(&app, "GET", "/users/val-a/notifications?unread=true", Some("val-a"), None).await;
        assert_eq!(status, StatusCode::OK);
        let inbox = inbox.as_array().cloned().unwrap_or_default();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0]["notification_type"], "document_validation_requested");

        let (status, _) =
            call(&app, "GET", "/users/val-a/notifications", Some("val-b"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, payload) =
            call(&app, "POST", "/users/val-a/notifications/read-all", Some("val-a"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["marked_read"], 1);

        let (_, inbox) =
            call(&app, "GET", "/users/val-a/notifications?unread=true", Some("val-a"), None).await;
        assert_eq!(inbox.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn preference_update_is_reflected_in_listing() {
        let app = app().await;

        let (status, _) = call(
            &app,
            "PUT",
            "/users/val-a/notification-preferences",
            Some("val-a"),
            Some(json!({
                "notification_type": "document_validation_approved",
                "delivery_method": "email",
                "frequency": "daily_digest",
                "enabled": false
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, preferences) =
            call(&app, "GET", "/users/val-a/notification-preferences", Some("val-a"), None).await;
        let approved = preferences
            .as_array()
            .and_then(|items| {
                items.iter().find(|item| {
                    item["notification_type"] == "document_validation_approved"
                })
            })
            .cloned()
            .unwrap_or(Value::Null);
        assert_eq!(approved["enabled"], false);
        assert_eq!(approved["frequency"], "daily_digest");
    }

    #[tokio::test]
    async fn personal_listings_cover_opened_and_decided_requests() {
        let app = app().await;
        let id = open_request(&app, &["val-a", "val-b"], 1).await;
        let (status, _) = call(
            &app,
            "POST",
            &format!("/validation-requests/{id}/approve"),
            Some("val-a"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, opened) =
            call(&app, "GET", "/me/validation-requests", Some("owner"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(opened[0]["id"], id.as_str());
        assert_eq!(opened[0]["status"], "approved");

        let (_, decided) = call(&app, "GET", "/me/validations", Some("val-a"), None).await;
        assert_eq!(decided.as_array().map(Vec::len), Some(1));
        let (_, awaiting) = call(&app, "GET", "/me/awaiting-validation", Some("val-a"), None).await;
        assert_eq!(awaiting, json!([]));

        let (status, _) = call(&app, "GET", "/me/validations", Some("ghost"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
