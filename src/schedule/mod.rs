// src/schedule/mod.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CareRequestRow, RequestStatus, Urgency};

pub mod controller;
pub mod grid;
pub mod http_backend;
pub mod slot;

pub use controller::{
    BackendError, IgnoreReason, MoveOutcome, MoveRequest, Proposal, ScheduleBackend,
    ScheduleBoard, Settlement, UpdateAck,
};
pub use grid::{WeekGrid, week_start_of};
pub use slot::{ALL_DAY_LABEL, Cell, SlotError, SlotTime};

/// Scheduling view of a care request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub scheduled_time_label: Option<String>,
    pub patient_name: String,
    pub urgency: Urgency,
    pub status: RequestStatus,
}

impl From<&CareRequestRow> for Appointment {
    fn from(r: &CareRequestRow) -> Self {
        Self {
            id: r.request_id,
            scheduled_date: r.scheduled_date,
            scheduled_time_label: r.scheduled_time.clone(),
            patient_name: format!("{} {}", r.first_name, r.last_name),
            urgency: r.urgency,
            status: r.status,
        }
    }
}
