use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use labstock_auth::Session;
use labstock_core::MaterialId;
use labstock_inventory::{MaterialDraft, MaterialPatch};

use crate::app::dto::{MaterialListParams, issue_details};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_materials).post(register_material))
        .route("/overview", get(get_overview))
        .route("/duplicates", get(get_duplicates))
        .route("/refresh", post(refresh_materials))
        .route(
            "/:id",
            get(get_material).patch(edit_material).delete(delete_material),
        )
        .route("/:id/issue", post(issue_material))
}

fn parse_id(raw: &str) -> Result<MaterialId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id("material"))
}

pub async fn list_materials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Query(params): Query<MaterialListParams>,
) -> axum::response::Response {
    let query = match params.into_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    match services.inventory.materials(&session, &query).await {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn register_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Json(body): Json<MaterialDraft>,
) -> axum::response::Response {
    match services.inventory.register(&session, body).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_overview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Query(params): Query<MaterialListParams>,
) -> axum::response::Response {
    let filtered = !params.is_empty();
    let query = match params.into_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    let result = services
        .inventory
        .overview(&session, filtered.then_some(&query))
        .await;
    match result {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_duplicates(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
) -> axum::response::Response {
    match services.inventory.duplicate_unique_ids(&session).await {
        Ok(ids) => (StatusCode::OK, Json(serde_json::json!({ "unique_ids": ids }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn refresh_materials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
) -> axum::response::Response {
    if let Err(e) = labstock_auth::authorize(&session, &labstock_auth::Permission::MATERIALS_READ) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    match services.inventory.refresh().await {
        Ok(batches) => (StatusCode::OK, Json(serde_json::json!({ "count": batches.len() }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.get(&session, id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn edit_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(body): Json<MaterialPatch>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.edit(&session, id, body).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inventory.delete(&session, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn issue_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let details = match issue_details(&body) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match services.inventory.issue(&session, id, details).await {
        Ok(issuance) => (StatusCode::CREATED, Json(issuance)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
