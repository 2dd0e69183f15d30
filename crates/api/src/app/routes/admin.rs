//! Admin routes: issuance reconciliation and account creation.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;

use labstock_auth::{IdentityError, Permission, Role, Session, authorize};

use crate::app::{errors, services::AppServices};

#[derive(Debug, Deserialize)]
pub struct CreatePersonRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

pub fn router() -> Router {
    Router::new()
        .route("/reconcile-issuances", post(reconcile_issuances))
        .route("/people", post(create_person))
}

pub async fn reconcile_issuances(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
) -> axum::response::Response {
    match services.inventory.reconcile_issuances(&session).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_person(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Json(body): Json<CreatePersonRequest>,
) -> axum::response::Response {
    if let Err(e) = authorize(&session, &Permission::PEOPLE_MANAGE) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let role = body.role.unwrap_or_default();
    match services
        .identity
        .sign_up(&body.email, &body.password, &body.name, role)
        .await
    {
        Ok(person) => (StatusCode::CREATED, Json(person)).into_response(),
        Err(IdentityError::EmailTaken(email)) => errors::json_error(
            StatusCode::CONFLICT,
            "email_taken",
            format!("an account already exists for '{email}'"),
        ),
        Err(IdentityError::Validation(msg)) => {
            errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        Err(e) => errors::json_error(StatusCode::BAD_GATEWAY, "identity_provider", e.to_string()),
    }
}
