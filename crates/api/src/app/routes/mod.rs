use axum::{Router, routing::get};

pub mod admin;
pub mod materials;
pub mod messages;
pub mod people;
pub mod records;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/dashboard", get(system::dashboard))
        .route("/stream", get(system::stream))
        .nest("/materials", materials::router())
        .nest("/records", records::router())
        .nest("/messages", messages::router())
        .nest("/people", people::router())
        .nest("/admin", admin::router())
}
