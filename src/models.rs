use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub notifier: Arc<Notifier>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleUpdateRequest {
    pub scheduled_date: DateTime<Utc>,
    pub scheduled_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum Urgency {
    Low = 0,
    Normal = 1,
    High = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum RequestStatus {
    Pending = 0,
    Confirmed = 1,
    Completed = 2,
    Cancelled = 3,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Confirmed => "confirmed",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub birthday: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A care request joined with the patient's name and phone.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CareRequestRow {
    pub request_id: Uuid,
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub care_type: String,
    pub details: Option<String>,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub scheduled_time: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column list matching `CareRequestRow`; expects `care_request r JOIN patient p`.
pub const CARE_REQUEST_COLUMNS: &str = r#"
    r.request_id,
    r.patient_id,
    p.first_name,
    p.last_name,
    p.phone,
    r.care_type,
    r.details,
    r.urgency,
    r.status,
    r.scheduled_date,
    r.scheduled_time,
    r.created_at,
    r.updated_at
"#;
