// src/routes/request_routes.rs

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, de::Deserializer};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        ApiOk, AppState, CARE_REQUEST_COLUMNS, CareRequestRow, RequestStatus,
        ScheduleUpdateRequest, Urgency,
    },
    schedule::{SlotTime, UpdateAck},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list_requests))
        .route("/requests/{request_id}", get(get_request).patch(patch_request))
        .route("/requests/{request_id}/schedule", patch(update_schedule))
}

pub(crate) async fn fetch_request(state: &AppState, request_id: Uuid) -> Result<CareRequestRow, ApiError> {
    let sql = format!(
        r#"
        SELECT {CARE_REQUEST_COLUMNS}
        FROM care_request r
        JOIN patient p ON p.patient_id = r.patient_id
        WHERE r.request_id = $1
        "#
    );

    sqlx::query_as::<_, CareRequestRow>(&sql)
        .bind(request_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "care request not found".into()))
}

/* ============================================================
   GET /requests
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<RequestStatus>,
    /// Inclusive bounds on the scheduled date, YYYY-MM-DD.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<CareRequestRow>>>, ApiError> {
    if let (Some(from), Some(to)) = (q.from, q.to) {
        if to < from {
            return Err(ApiError::validation("to must not be before from"));
        }
    }

    let from_ts = q.from.map(|d| d.and_time(NaiveTime::MIN).and_utc());
    let to_ts = q
        .to
        .map(|d| d.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::days(1));

    let sql = format!(
        r#"
        SELECT {CARE_REQUEST_COLUMNS}
        FROM care_request r
        JOIN patient p ON p.patient_id = r.patient_id
        WHERE ($1::smallint IS NULL OR r.status = $1)
          AND ($2::timestamptz IS NULL OR r.scheduled_date >= $2)
          AND ($3::timestamptz IS NULL OR r.scheduled_date <  $3)
        ORDER BY r.scheduled_date ASC NULLS LAST, r.created_at DESC
        "#
    );

    let rows = sqlx::query_as::<_, CareRequestRow>(&sql)
        .bind(q.status)
        .bind(from_ts)
        .bind(to_ts)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET /requests/{id}
   ============================================================ */

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ApiOk<CareRequestRow>>, ApiError> {
    Ok(Json(ApiOk {
        data: fetch_request(&state, request_id).await?,
    }))
}

/* ============================================================
   PATCH /requests/{id}
   ============================================================ */

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Only called when the field is present: null => Some(None), value => Some(Some(v)).
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

#[derive(Debug, Deserialize)]
pub struct PatchRequest {
    pub status: Option<RequestStatus>,
    pub urgency: Option<Urgency>,
    pub care_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub details: Option<Option<String>>,
}

pub async fn patch_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<PatchRequest>,
) -> Result<Json<ApiOk<CareRequestRow>>, ApiError> {
    let care_type = match req.care_type.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::validation("care_type cannot be empty")),
        other => other.map(str::to_string),
    };

    // details: absent => keep, null => clear, value => set
    let (set_details, details) = match req.details {
        None => (false, None),
        Some(d) => (true, d.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())),
    };

    let updated = sqlx::query(
        r#"
        UPDATE care_request
        SET
          status    = COALESCE($2, status),
          urgency   = COALESCE($3, urgency),
          care_type = COALESCE($4, care_type),
          details   = CASE WHEN $5 THEN $6 ELSE details END,
          updated_at = now()
        WHERE request_id = $1
        "#,
    )
    .bind(request_id)
    .bind(req.status)
    .bind(req.urgency)
    .bind(care_type)
    .bind(set_details)
    .bind(details)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "care request not found".into()));
    }

    tracing::info!(%request_id, "care request updated");
    get_request(State(state), Path(request_id)).await
}

/* ============================================================
   PATCH /requests/{id}/schedule
   ============================================================ */

/// Failure of the slot update: same status as the underlying error, but the
/// `{ success: false, error }` body the scheduling client reads.
#[derive(Debug)]
pub struct ScheduleRejection(pub ApiError);

impl From<ApiError> for ScheduleRejection {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ScheduleRejection {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(message = %self.0.message(), "slot update failed");
        }
        (status, Json(UpdateAck::rejected(self.0.message()))).into_response()
    }
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    payload: Result<Json<ScheduleUpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateAck>, ScheduleRejection> {
    let Json(req) = payload.map_err(|e| ApiError::validation(e.body_text()))?;

    let slot = SlotTime::parse(&req.scheduled_time).map_err(|e| ApiError::validation(e.to_string()))?;

    let updated = sqlx::query(
        r#"
        UPDATE care_request
        SET scheduled_date = $2,
            scheduled_time = $3,
            updated_at = now()
        WHERE request_id = $1
        "#,
    )
    .bind(request_id)
    .bind(req.scheduled_date)
    .bind(slot.label())
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "care request not found".into()).into());
    }

    tracing::info!(
        %request_id,
        date = %req.scheduled_date.date_naive(),
        slot = %slot,
        "care request rescheduled"
    );
    Ok(Json(UpdateAck::ok()))
}
