// src/routes/schedule_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, CARE_REQUEST_COLUMNS, CareRequestRow},
    schedule::{Appointment, WeekGrid, grid::DAYS_PER_WEEK, week_start_of},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedule/appointments", get(list_appointments))
        .route("/schedule/week", get(get_week))
}

/* ============================================================
   GET /schedule/appointments
   ============================================================ */

/// Full appointment collection; the dashboard reloads from here after a failed move.
pub async fn list_appointments(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let sql = format!(
        r#"
        SELECT {CARE_REQUEST_COLUMNS}
        FROM care_request r
        JOIN patient p ON p.patient_id = r.patient_id
        ORDER BY r.scheduled_date ASC NULLS LAST, r.created_at ASC
        "#
    );

    let rows = sqlx::query_as::<_, CareRequestRow>(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: rows.iter().map(Appointment::from).collect(),
    }))
}

/* ============================================================
   GET /schedule/week
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    /// Any day of the wanted week, YYYY-MM-DD. Defaults to today.
    pub start: Option<String>,
}

pub async fn get_week(
    State(state): State<AppState>,
    Query(q): Query<WeekQuery>,
) -> Result<Json<ApiOk<WeekGrid>>, ApiError> {
    let day = match q.start.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ApiError::validation("start must be YYYY-MM-DD"))?,
        None => Utc::now().date_naive(),
    };
    let week_start = week_start_of(day);

    // Range: [monday, monday + 7 days), in UTC days like `same_day`.
    let start_ts = week_start.and_time(NaiveTime::MIN).and_utc();
    let end_ts = start_ts + Duration::days(DAYS_PER_WEEK as i64);

    let sql = format!(
        r#"
        SELECT {CARE_REQUEST_COLUMNS}
        FROM care_request r
        JOIN patient p ON p.patient_id = r.patient_id
        WHERE r.scheduled_date >= $1
          AND r.scheduled_date <  $2
        ORDER BY r.scheduled_date ASC, r.created_at ASC
        "#
    );

    let rows = sqlx::query_as::<_, CareRequestRow>(&sql)
        .bind(start_ts)
        .bind(end_ts)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    let appointments: Vec<Appointment> = rows.iter().map(Appointment::from).collect();
    let grid = WeekGrid::build(week_start, &appointments);

    if !grid.off_grid.is_empty() || !grid.unparsed_labels.is_empty() {
        tracing::warn!(
            %week_start,
            off_grid = grid.off_grid.len(),
            unparsed = grid.unparsed_labels.len(),
            "week has appointments without a regular time slot"
        );
    }

    Ok(Json(ApiOk { data: grid }))
}
