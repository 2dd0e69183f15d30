use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use labstock_auth::Session;
use labstock_core::MessageId;
use labstock_messages::MessageDraft;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(inbox).post(send_message))
        .route("/unread-count", get(unread_count))
        .route("/:id/read", post(mark_as_read))
        .route("/:id", delete(delete_message))
}

pub async fn inbox(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
) -> axum::response::Response {
    match services.messages.inbox(&session).await {
        Ok(inbox) => (StatusCode::OK, Json(inbox)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn send_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Json(body): Json<MessageDraft>,
) -> axum::response::Response {
    match services.messages.send(&session, body).await {
        Ok(message) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn unread_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
) -> axum::response::Response {
    match services.messages.unread_count(&session).await {
        Ok(count) => (StatusCode::OK, Json(serde_json::json!({ "unread": count }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn mark_as_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MessageId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("message"),
    };

    match services.messages.mark_as_read(&session, id).await {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MessageId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("message"),
    };

    match services.messages.delete(&session, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
