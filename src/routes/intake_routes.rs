// src/routes/intake_routes.rs

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    intake::{self, FieldError, IntakeError, IntakeSubmission},
    models::{ApiOk, AppState, CareRequestRow},
    notify::{DispatchReport, IntakeNotice},
    routes::request_routes::fetch_request,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/intake", post(submit_intake))
        .route("/intake/steps/{step}", post(validate_step))
}

fn field_errors(errors: &[FieldError]) -> ApiError {
    let summary = errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    ApiError::validation(summary)
}

/* ============================================================
   POST /intake/steps/{step}
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct StepResult {
    pub step: u8,
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

pub async fn validate_step(
    Path(step): Path<u8>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<ApiOk<StepResult>>, ApiError> {
    let errors = intake::validate_step(step, payload, Utc::now().date_naive()).map_err(|e| match e {
        IntakeError::UnknownStep(_) => ApiError::NotFound("UNKNOWN_STEP", e.to_string()),
        IntakeError::Malformed(_) => ApiError::validation(e.to_string()),
    })?;

    Ok(Json(ApiOk {
        data: StepResult {
            step,
            valid: errors.is_empty(),
            errors,
        },
    }))
}

/* ============================================================
   POST /intake
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct IntakeReceipt {
    pub request: CareRequestRow,
    pub notifications: DispatchReport,
}

pub async fn submit_intake(
    State(state): State<AppState>,
    Json(req): Json<IntakeSubmission>,
) -> Result<Json<ApiOk<IntakeReceipt>>, ApiError> {
    let intake = req
        .validate(Utc::now().date_naive())
        .map_err(|errors| field_errors(&errors))?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    // Returning patients are matched on phone + last name.
    let patient_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO patient (patient_id, first_name, last_name, phone, email, address, city, postal_code, birthday)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        ON CONFLICT (phone, lower(last_name))
        DO UPDATE SET
          first_name  = EXCLUDED.first_name,
          email       = COALESCE(EXCLUDED.email, patient.email),
          address     = EXCLUDED.address,
          city        = EXCLUDED.city,
          postal_code = EXCLUDED.postal_code,
          birthday    = COALESCE(EXCLUDED.birthday, patient.birthday)
        RETURNING patient_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&intake.first_name)
    .bind(&intake.last_name)
    .bind(&intake.phone)
    .bind(intake.email.as_deref())
    .bind(&intake.address)
    .bind(&intake.city)
    .bind(&intake.postal_code)
    .bind(intake.birthday)
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    let request_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO care_request (request_id, patient_id, care_type, details, urgency, status, scheduled_date, scheduled_time)
        VALUES ($1,$2,$3,$4,$5, 0, $6, $7)
        "#,
    )
    .bind(request_id)
    .bind(patient_id)
    .bind(&intake.care_type)
    .bind(intake.details.as_deref())
    .bind(intake.urgency)
    .bind(intake.preferred_date)
    .bind(intake.preferred_time.map(|s| s.label()))
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::BadRequest("REQUEST_CREATE_FAILED", format!("{e}")))?;

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(%request_id, %patient_id, urgency = intake.urgency.as_str(), "intake received");

    let request = fetch_request(&state, request_id).await?;
    let notifications = state
        .notifier
        .dispatch(&IntakeNotice {
            patient_name: format!("{} {}", intake.first_name, intake.last_name),
            phone: intake.phone.clone(),
            city: intake.city.clone(),
            care_type: intake.care_type.clone(),
            urgency: intake.urgency,
            preferred_date: intake.preferred_date,
            preferred_time: intake.preferred_time.map(|s| s.label()),
            details: intake.details.clone(),
        })
        .await;

    Ok(Json(ApiOk {
        data: IntakeReceipt {
            request,
            notifications,
        },
    }))
}
