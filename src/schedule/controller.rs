// src/schedule/controller.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Appointment;
use super::slot::Cell;

/// Shown when the update never produced a readable answer.
pub const GENERIC_MOVE_ERROR: &str = "Failed to update the appointment, please try again";

/// Body returned by the slot update endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("unreadable response: {0}")]
    Decode(String),
}

/// Server side of the schedule: one update call and one list call.
#[async_trait]
pub trait ScheduleBackend: Send + Sync {
    async fn update_slot(
        &self,
        id: Uuid,
        scheduled_date: DateTime<Utc>,
        time_label: &str,
    ) -> Result<UpdateAck, BackendError>;

    async fn list_appointments(&self) -> Result<Vec<Appointment>, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    SameCell,
    AlreadyPending,
    Resyncing,
    UnknownAppointment,
}

/// An optimistic move waiting for the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveRequest {
    pub id: Uuid,
    pub target: Cell,
    pub scheduled_date: DateTime<Utc>,
    pub time_label: String,
    pub previous_date: Option<DateTime<Utc>>,
    pub previous_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Ignored(IgnoreReason),
    Dispatch(MoveRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Committed,
    RolledBack { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Ignored(IgnoreReason),
    Committed(MoveRequest),
    RolledBack {
        request: MoveRequest,
        message: String,
        /// Whether the follow-up refetch reached the server.
        resynced: bool,
    },
}

/// Client-side schedule state: the appointment list, the moves in flight
/// keyed by appointment id, and whether a full resynchronisation is running.
pub struct ScheduleBoard<B> {
    backend: B,
    appointments: Vec<Appointment>,
    pending: HashMap<Uuid, MoveRequest>,
    is_updating: bool,
}

impl<B: ScheduleBackend> ScheduleBoard<B> {
    pub fn new(backend: B) -> Self {
        Self::with_appointments(backend, Vec::new())
    }

    pub fn with_appointments(backend: B, appointments: Vec<Appointment>) -> Self {
        Self {
            backend,
            appointments,
            pending: HashMap::new(),
            is_updating: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn appointment(&self, id: Uuid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_updating(&self) -> bool {
        self.is_updating
    }

    /// Apply a move locally and mark it pending.
    pub fn propose(&mut self, id: Uuid, target: Cell) -> Proposal {
        if self.is_updating {
            return Proposal::Ignored(IgnoreReason::Resyncing);
        }
        if self.pending.contains_key(&id) {
            return Proposal::Ignored(IgnoreReason::AlreadyPending);
        }
        let Some(appointment) = self.appointments.iter_mut().find(|a| a.id == id) else {
            return Proposal::Ignored(IgnoreReason::UnknownAppointment);
        };
        if target.contains(appointment) {
            return Proposal::Ignored(IgnoreReason::SameCell);
        }

        let scheduled_date = target.scheduled_at();
        let time_label = target.slot.label();

        let previous_date = appointment.scheduled_date.replace(scheduled_date);
        let previous_label = appointment.scheduled_time_label.replace(time_label.clone());

        let request = MoveRequest {
            id,
            target,
            scheduled_date,
            time_label,
            previous_date,
            previous_label,
        };
        self.pending.insert(id, request.clone());

        tracing::debug!(%id, day = %target.day, slot = %target.slot, "appointment move dispatched");

        Proposal::Dispatch(request)
    }

    /// Resolve a pending move with the server's answer.
    pub fn settle(
        &mut self,
        request: &MoveRequest,
        result: Result<UpdateAck, BackendError>,
    ) -> Settlement {
        self.pending.remove(&request.id);

        let message = match result {
            Ok(ack) if ack.success => {
                // A resync may have replaced the list while this move was in flight.
                if let Some(a) = self.appointments.iter_mut().find(|a| a.id == request.id) {
                    apply_move(a, request);
                }
                tracing::info!(id = %request.id, label = %request.time_label, "appointment move committed");
                return Settlement::Committed;
            }
            Ok(ack) => ack.error.unwrap_or_else(|| GENERIC_MOVE_ERROR.to_string()),
            Err(e) => {
                tracing::warn!(id = %request.id, error = %e, "appointment move failed in transport");
                GENERIC_MOVE_ERROR.to_string()
            }
        };

        if let Some(a) = self.appointments.iter_mut().find(|a| a.id == request.id) {
            a.scheduled_date = request.previous_date;
            a.scheduled_time_label = request.previous_label.clone();
        }

        tracing::warn!(id = %request.id, %message, "appointment move rolled back");
        Settlement::RolledBack { message }
    }

    pub fn begin_resync(&mut self) {
        self.is_updating = true;
    }

    /// Replace local state with the server's list. Moves still in flight are
    /// re-applied on top of it. On failure the local list is kept.
    pub fn finish_resync(
        &mut self,
        result: Result<Vec<Appointment>, BackendError>,
    ) -> Result<(), BackendError> {
        self.is_updating = false;
        match result {
            Ok(mut list) => {
                for a in list.iter_mut() {
                    if let Some(request) = self.pending.get(&a.id) {
                        apply_move(a, request);
                    }
                }
                tracing::debug!(
                    count = list.len(),
                    in_flight = self.pending.len(),
                    "appointment list resynchronised"
                );
                self.appointments = list;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "appointment list refetch failed");
                Err(e)
            }
        }
    }

    pub async fn resync(&mut self) -> Result<(), BackendError> {
        self.begin_resync();
        let result = self.backend.list_appointments().await;
        self.finish_resync(result)
    }

    /// One drag-and-drop gesture from drop to reconciliation.
    pub async fn move_appointment(&mut self, id: Uuid, target: Cell) -> MoveOutcome {
        let request = match self.propose(id, target) {
            Proposal::Ignored(reason) => return MoveOutcome::Ignored(reason),
            Proposal::Dispatch(request) => request,
        };

        let result = self
            .backend
            .update_slot(request.id, request.scheduled_date, &request.time_label)
            .await;

        match self.settle(&request, result) {
            Settlement::Committed => MoveOutcome::Committed(request),
            Settlement::RolledBack { message } => {
                let resynced = self.resync().await.is_ok();
                MoveOutcome::RolledBack {
                    request,
                    message,
                    resynced,
                }
            }
        }
    }
}

fn apply_move(appointment: &mut Appointment, request: &MoveRequest) {
    appointment.scheduled_date = Some(request.scheduled_date);
    appointment.scheduled_time_label = Some(request.time_label.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestStatus, Urgency};
    use crate::schedule::slot::{ALL_DAY_LABEL, SlotTime};
    use chrono::{NaiveDate, TimeZone};

    struct NoBackend;

    #[async_trait]
    impl ScheduleBackend for NoBackend {
        async fn update_slot(
            &self,
            _id: Uuid,
            _scheduled_date: DateTime<Utc>,
            _time_label: &str,
        ) -> Result<UpdateAck, BackendError> {
            Err(BackendError::Transport("offline".into()))
        }

        async fn list_appointments(&self) -> Result<Vec<Appointment>, BackendError> {
            Err(BackendError::Transport("offline".into()))
        }
    }

    fn appointment(id: Uuid, day: u32, label: Option<&str>) -> Appointment {
        Appointment {
            id,
            scheduled_date: Some(Utc.with_ymd_and_hms(2024, 1, day, 8, 30, 0).unwrap()),
            scheduled_time_label: label.map(str::to_string),
            patient_name: "Jeanne Martin".into(),
            urgency: Urgency::Normal,
            status: RequestStatus::Confirmed,
        }
    }

    fn cell(day: u32, slot: SlotTime) -> Cell {
        Cell::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), slot)
    }

    #[test]
    fn propose_applies_the_move_before_any_answer() {
        let id = Uuid::new_v4();
        let mut board = ScheduleBoard::with_appointments(NoBackend, vec![appointment(id, 1, Some("9h00"))]);

        let Proposal::Dispatch(req) = board.propose(id, cell(4, SlotTime::Hour(14))) else {
            panic!("expected dispatch");
        };

        assert_eq!(req.time_label, "14h00");
        assert_eq!(req.scheduled_date, Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap());
        assert!(board.is_pending(id));
        let moved = board.appointment(id).unwrap();
        assert_eq!(moved.scheduled_time_label.as_deref(), Some("14h00"));
        assert_eq!(moved.scheduled_date, Some(req.scheduled_date));
    }

    #[test]
    fn same_cell_drop_is_a_no_op() {
        let id = Uuid::new_v4();
        let before = appointment(id, 1, Some("9h00"));
        let mut board = ScheduleBoard::with_appointments(NoBackend, vec![before.clone()]);

        assert_eq!(
            board.propose(id, cell(1, SlotTime::Hour(9))),
            Proposal::Ignored(IgnoreReason::SameCell)
        );
        assert_eq!(board.appointment(id), Some(&before));
        assert_eq!(board.pending_count(), 0);
    }

    #[test]
    fn missing_label_counts_as_the_all_day_cell() {
        let id = Uuid::new_v4();
        let mut board = ScheduleBoard::with_appointments(NoBackend, vec![appointment(id, 2, None)]);

        assert_eq!(
            board.propose(id, cell(2, SlotTime::AllDay)),
            Proposal::Ignored(IgnoreReason::SameCell)
        );
    }

    #[test]
    fn second_drop_while_pending_is_ignored() {
        let id = Uuid::new_v4();
        let mut board = ScheduleBoard::with_appointments(NoBackend, vec![appointment(id, 1, Some("9h00"))]);

        assert!(matches!(board.propose(id, cell(2, SlotTime::Hour(10))), Proposal::Dispatch(_)));
        assert_eq!(
            board.propose(id, cell(3, SlotTime::Hour(11))),
            Proposal::Ignored(IgnoreReason::AlreadyPending)
        );
        assert_eq!(board.appointment(id).unwrap().scheduled_time_label.as_deref(), Some("10h00"));
    }

    #[test]
    fn drops_are_ignored_during_resync() {
        let id = Uuid::new_v4();
        let mut board = ScheduleBoard::with_appointments(NoBackend, vec![appointment(id, 1, Some("9h00"))]);

        board.begin_resync();
        assert_eq!(
            board.propose(id, cell(2, SlotTime::Hour(10))),
            Proposal::Ignored(IgnoreReason::Resyncing)
        );
        assert!(board.finish_resync(Ok(vec![])).is_ok());
        assert!(!board.is_updating());
        assert!(board.appointments().is_empty());
    }

    #[test]
    fn unknown_id_is_ignored() {
        let mut board = ScheduleBoard::new(NoBackend);
        assert_eq!(
            board.propose(Uuid::new_v4(), cell(2, SlotTime::AllDay)),
            Proposal::Ignored(IgnoreReason::UnknownAppointment)
        );
    }

    #[test]
    fn rejection_restores_previous_slot_and_clears_pending() {
        let id = Uuid::new_v4();
        let original = appointment(id, 1, Some(ALL_DAY_LABEL));
        let mut board = ScheduleBoard::with_appointments(NoBackend, vec![original.clone()]);

        let Proposal::Dispatch(req) = board.propose(id, cell(5, SlotTime::Hour(6))) else {
            panic!("expected dispatch");
        };
        let settlement = board.settle(&req, Ok(UpdateAck::rejected("créneau indisponible")));

        assert_eq!(
            settlement,
            Settlement::RolledBack {
                message: "créneau indisponible".into()
            }
        );
        assert!(!board.is_pending(id));
        assert_eq!(board.appointment(id), Some(&original));
    }

    #[test]
    fn transport_error_uses_generic_message() {
        let id = Uuid::new_v4();
        let mut board = ScheduleBoard::with_appointments(NoBackend, vec![appointment(id, 1, Some("9h00"))]);

        let Proposal::Dispatch(req) = board.propose(id, cell(2, SlotTime::Hour(9))) else {
            panic!("expected dispatch");
        };
        let settlement = board.settle(&req, Err(BackendError::Status(502)));

        assert_eq!(
            settlement,
            Settlement::RolledBack {
                message: GENERIC_MOVE_ERROR.into()
            }
        );
        assert_eq!(board.pending_count(), 0);
    }

    #[test]
    fn resync_keeps_moves_still_in_flight() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let server = vec![appointment(a, 1, Some("9h00")), appointment(b, 1, Some("10h00"))];
        let mut board = ScheduleBoard::with_appointments(NoBackend, server.clone());

        let Proposal::Dispatch(req) = board.propose(a, cell(4, SlotTime::Hour(14))) else {
            panic!("expected dispatch");
        };
        board.begin_resync();
        assert!(board.finish_resync(Ok(server)).is_ok());

        let shown = board.appointment(a).unwrap();
        assert_eq!(shown.scheduled_time_label.as_deref(), Some("14h00"));
        assert_eq!(shown.scheduled_date, Some(req.scheduled_date));
        assert_eq!(board.appointment(b).unwrap().scheduled_time_label.as_deref(), Some("10h00"));
        assert!(board.is_pending(a));
    }

    #[test]
    fn success_keeps_the_optimistic_state() {
        let id = Uuid::new_v4();
        let mut board = ScheduleBoard::with_appointments(NoBackend, vec![appointment(id, 1, Some("9h00"))]);

        let Proposal::Dispatch(req) = board.propose(id, cell(2, SlotTime::Hour(12))) else {
            panic!("expected dispatch");
        };
        assert_eq!(board.settle(&req, Ok(UpdateAck::ok())), Settlement::Committed);
        assert!(!board.is_pending(id));
        assert_eq!(board.appointment(id).unwrap().scheduled_time_label.as_deref(), Some("12h00"));
    }
}
