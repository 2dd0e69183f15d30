use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use labstock_auth::Session;
use labstock_core::RecordId;

use crate::app::dto::RecordListParams;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_records))
        .route("/:id", get(get_record).delete(delete_record))
}

pub async fn list_records(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Query(params): Query<RecordListParams>,
) -> axum::response::Response {
    let query = match params.into_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    match services.inventory.recorder().list(&session, &query).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("record"),
    };

    match services.inventory.recorder().get(&session, id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Administrative correction; admins only.
pub async fn delete_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("record"),
    };

    match services.inventory.recorder().delete(&session, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
