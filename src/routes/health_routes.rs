use axum::{Json, Router, extract::State, routing::get};

use crate::error::ApiError;
use crate::models::{ApiOk, AppState};

#[derive(serde::Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub database: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<ApiOk<HealthData>>, ApiError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .map_err(|e| ApiError::Unavailable(format!("database unreachable: {e}")))?;

    Ok(Json(ApiOk {
        data: HealthData {
            status: "ok",
            database: "up",
        },
    }))
}
