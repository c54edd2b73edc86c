// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, CARE_REQUEST_COLUMNS, CareRequestRow, PatientRow},
};

const PATIENT_COLUMNS: &str =
    "patient_id, first_name, last_name, phone, email, address, city, postal_code, birthday, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(search_patients))
        .route("/patients/{patient_id}", get(get_patient))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub async fn search_patients(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    let query = q.query.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        // default: most recent
        let sql = format!(
            r#"
            SELECT {PATIENT_COLUMNS}
            FROM patient
            ORDER BY created_at DESC
            LIMIT 50
            "#
        );
        let rows = sqlx::query_as::<_, PatientRow>(&sql)
            .fetch_all(&state.db)
            .await
            .map_err(ApiError::db)?;
        return Ok(Json(ApiOk { data: rows }));
    }

    let like = format!("%{}%", query);
    let sql = format!(
        r#"
        SELECT {PATIENT_COLUMNS}
        FROM patient
        WHERE first_name ILIKE $1
           OR last_name ILIKE $1
           OR phone ILIKE $1
           OR COALESCE(email, '') ILIKE $1
           OR (first_name || ' ' || last_name) ILIKE $1
        ORDER BY last_name ASC, first_name ASC
        LIMIT 50
        "#
    );
    let rows = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(like)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Serialize)]
pub struct PatientDetail {
    pub patient: PatientRow,
    pub requests: Vec<CareRequestRow>,
}

pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<PatientDetail>>, ApiError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patient WHERE patient_id = $1");
    let patient = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(patient_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "patient not found".into()))?;

    let sql = format!(
        r#"
        SELECT {CARE_REQUEST_COLUMNS}
        FROM care_request r
        JOIN patient p ON p.patient_id = r.patient_id
        WHERE r.patient_id = $1
        ORDER BY r.created_at DESC
        "#
    );
    let requests = sqlx::query_as::<_, CareRequestRow>(&sql)
        .bind(patient_id)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: PatientDetail { patient, requests },
    }))
}
