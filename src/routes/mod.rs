use crate::models::AppState;
use axum::Router;

pub mod health_routes;
pub mod intake_routes;
pub mod patient_routes;
pub mod request_routes;
pub mod schedule_routes;
pub mod stats_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", intake_routes::router())
        .nest("/api/v1", request_routes::router())
        .nest("/api/v1", schedule_routes::router())
        .nest("/api/v1", patient_routes::router())
        .nest("/api/v1/stats", stats_routes::router())
        .merge(health_routes::router())
        .with_state(state)
}
