use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use labstock_auth::{Permission, Session, authorize};

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/", get(list_people))
}

/// Personnel view: everyone with a profile, newest first.
pub async fn list_people(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
) -> axum::response::Response {
    if let Err(e) = authorize(&session, &Permission::PERSONNEL_READ) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.identity.list_people().await {
        Ok(people) => (StatusCode::OK, Json(people)).into_response(),
        Err(e) => errors::json_error(StatusCode::BAD_GATEWAY, "identity_provider", e.to_string()),
    }
}
