// src/routes/stats_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState},
    stats::{Bucket, MAX_BUCKETS, RequestStats, StatsRecord, bucket_count, summarize},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/requests", get(request_stats))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub bucket: Bucket,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn check_range(bucket: Bucket, range: Option<(NaiveDate, NaiveDate)>) -> Result<(), ApiError> {
    match range {
        Some((from, to)) if bucket_count(bucket, from, to) > MAX_BUCKETS => Err(ApiError::validation(
            format!("range spans more than {MAX_BUCKETS} buckets"),
        )),
        _ => Ok(()),
    }
}

pub async fn request_stats(
    State(state): State<AppState>,
    Query(q): Query<StatsQuery>,
) -> Result<Json<ApiOk<RequestStats>>, ApiError> {
    let range = match (q.from, q.to) {
        (Some(from), Some(to)) if to < from => {
            return Err(ApiError::validation("to must not be before from"));
        }
        (Some(from), Some(to)) => Some((from, to)),
        (None, None) => None,
        _ => return Err(ApiError::validation("from and to go together")),
    };
    check_range(q.bucket, range)?;

    let records: Vec<StatsRecord> = sqlx::query_as::<_, StatsRecord>(
        r#"
        SELECT created_at, status, urgency
        FROM care_request
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: summarize(&records, q.bucket, range),
    }))
}
