use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use labstock_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let code = err.code();
    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        ServiceError::NotFound => json_error(StatusCode::NOT_FOUND, code, "not found"),
        ServiceError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, code, msg),
        ServiceError::Conflict { step, message } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": code,
                "message": message,
                "step": step,
            })),
        )
            .into_response(),
        ServiceError::Transport { step, message } => {
            tracing::error!(%step, %message, "store failure");
            (
                StatusCode::BAD_GATEWAY,
                axum::Json(json!({
                    "error": code,
                    "message": message,
                    "step": step,
                })),
            )
                .into_response()
        }
        ServiceError::PartialCompletion {
            step,
            material_id,
            record_id,
            message,
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": code,
                "message": message,
                "step": step,
                "material_id": material_id,
                "record_id": record_id,
            })),
        )
            .into_response(),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}
