// src/schedule/grid.rs

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use super::Appointment;
use super::controller::{MoveOutcome, ScheduleBackend, ScheduleBoard};
use super::slot::{ALL_DAY_BUCKET, Cell, LabelKind, SlotTime, classify, hour_bucket};

pub const DAYS_PER_WEEK: usize = 7;

#[derive(Debug, Clone, Serialize)]
pub struct SlotRow {
    pub slot: SlotTime,
    pub label: String,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayColumn {
    pub date: NaiveDate,
    pub rows: Vec<SlotRow>,
}

impl DayColumn {
    pub fn row(&self, slot: SlotTime) -> Option<&SlotRow> {
        self.rows.iter().find(|r| r.slot == slot)
    }
}

/// Seven days by (all-day + hour) rows, rebuilt from the appointment list on demand.
#[derive(Debug, Clone, Serialize)]
pub struct WeekGrid {
    pub week_start: NaiveDate,
    pub days: Vec<DayColumn>,
    /// Dated this week, but at an hour the grid has no row for.
    pub off_grid: Vec<Appointment>,
    /// Shown in the all-day row although their label is not a recognised time.
    pub unparsed_labels: Vec<Uuid>,
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

impl WeekGrid {
    pub fn build(week_start: NaiveDate, appointments: &[Appointment]) -> Self {
        let days: Vec<DayColumn> = (0..DAYS_PER_WEEK)
            .map(|i| {
                let date = week_start + Duration::days(i as i64);
                let rows = SlotTime::all()
                    .map(|slot| {
                        let cell = Cell::new(date, slot);
                        SlotRow {
                            slot,
                            label: slot.label(),
                            appointments: appointments
                                .iter()
                                .filter(|a| cell.contains(a))
                                .cloned()
                                .collect(),
                        }
                    })
                    .collect();
                DayColumn { date, rows }
            })
            .collect();

        let week_end = week_start + Duration::days(DAYS_PER_WEEK as i64);
        let in_week: Vec<&Appointment> = appointments
            .iter()
            .filter(|a| {
                a.scheduled_date
                    .map(|d| d.date_naive())
                    .is_some_and(|d| d >= week_start && d < week_end)
            })
            .collect();

        let off_grid = in_week
            .iter()
            .filter(|a| {
                let bucket = hour_bucket(a.scheduled_time_label.as_deref());
                bucket != ALL_DAY_BUCKET && SlotTime::from_bucket(bucket).is_err()
            })
            .map(|a| (*a).clone())
            .collect();

        let unparsed_labels = in_week
            .iter()
            .filter(|a| matches!(classify(a.scheduled_time_label.as_deref()), LabelKind::Unparsed(_)))
            .map(|a| a.id)
            .collect();

        Self {
            week_start,
            days,
            off_grid,
            unparsed_labels,
        }
    }

    /// Drop targets in render order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.days
            .iter()
            .flat_map(|d| d.rows.iter().map(move |r| Cell::new(d.date, r.slot)))
    }

    /// Resolve a (day index, hour bucket) drop target.
    pub fn cell_at(&self, day_index: usize, bucket: u32) -> Option<Cell> {
        let day = self.days.get(day_index)?;
        let slot = SlotTime::from_bucket(bucket).ok()?;
        Some(Cell::new(day.date, slot))
    }

    /// Cells holding the given appointment.
    pub fn cells_of(&self, id: Uuid) -> Vec<Cell> {
        self.days
            .iter()
            .flat_map(|d| {
                d.rows
                    .iter()
                    .filter(|r| r.appointments.iter().any(|a| a.id == id))
                    .map(move |r| Cell::new(d.date, r.slot))
            })
            .collect()
    }

    /// Hand a drop on (day index, hour bucket) to the controller.
    /// `None` when the target is not a cell of this grid.
    pub async fn drop_on<B: ScheduleBackend>(
        &self,
        board: &mut ScheduleBoard<B>,
        id: Uuid,
        day_index: usize,
        bucket: u32,
    ) -> Option<MoveOutcome> {
        let cell = self.cell_at(day_index, bucket)?;
        Some(board.move_appointment(id, cell).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestStatus, Urgency};
    use crate::schedule::slot::ALL_DAY_LABEL;
    use chrono::{TimeZone, Utc};

    fn appointment(y: i32, m: u32, d: u32, label: Option<&str>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            scheduled_date: Some(Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()),
            scheduled_time_label: label.map(str::to_string),
            patient_name: "Paul Durand".into(),
            urgency: Urgency::Low,
            status: RequestStatus::Pending,
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn builds_seven_days_of_seventeen_rows() {
        let grid = WeekGrid::build(monday(), &[]);
        assert_eq!(grid.days.len(), 7);
        assert!(grid.days.iter().all(|d| d.rows.len() == 17));
        assert_eq!(grid.days[6].date, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert_eq!(grid.cells().count(), 7 * 17);
    }

    #[test]
    fn wednesday_nine_oclock_lands_in_exactly_one_cell() {
        let a = appointment(2024, 1, 3, Some("9h00"));
        let grid = WeekGrid::build(monday(), std::slice::from_ref(&a));

        let cells = grid.cells_of(a.id);
        assert_eq!(
            cells,
            vec![Cell::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), SlotTime::Hour(9))]
        );
        assert_eq!(grid.days[2].row(SlotTime::Hour(9)).unwrap().appointments.len(), 1);
    }

    #[test]
    fn all_day_label_lands_in_all_day_row_only() {
        let a = appointment(2024, 1, 5, Some(ALL_DAY_LABEL));
        let grid = WeekGrid::build(monday(), std::slice::from_ref(&a));

        assert_eq!(
            grid.cells_of(a.id),
            vec![Cell::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), SlotTime::AllDay)]
        );
        assert!(grid.unparsed_labels.is_empty());
    }

    #[test]
    fn undated_and_other_weeks_are_not_rendered() {
        let mut undated = appointment(2024, 1, 2, Some("9h00"));
        undated.scheduled_date = None;
        let next_week = appointment(2024, 1, 8, Some("9h00"));

        let grid = WeekGrid::build(monday(), &[undated.clone(), next_week.clone()]);
        assert!(grid.cells_of(undated.id).is_empty());
        assert!(grid.cells_of(next_week.id).is_empty());
    }

    #[test]
    fn late_hours_are_reported_off_grid() {
        let late = appointment(2024, 1, 2, Some("22h00"));
        let grid = WeekGrid::build(monday(), std::slice::from_ref(&late));

        assert!(grid.cells_of(late.id).is_empty());
        assert_eq!(grid.off_grid.len(), 1);
        assert_eq!(grid.off_grid[0].id, late.id);
    }

    #[test]
    fn unparsed_labels_render_all_day_and_are_flagged() {
        let odd = appointment(2024, 1, 4, Some("en matinée"));
        let grid = WeekGrid::build(monday(), std::slice::from_ref(&odd));

        assert_eq!(grid.cells_of(odd.id).len(), 1);
        assert_eq!(grid.days[3].row(SlotTime::AllDay).unwrap().appointments.len(), 1);
        assert_eq!(grid.unparsed_labels, vec![odd.id]);
    }

    #[test]
    fn cell_at_validates_targets() {
        let grid = WeekGrid::build(monday(), &[]);
        assert_eq!(
            grid.cell_at(3, 14),
            Some(Cell::new(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(), SlotTime::Hour(14)))
        );
        assert_eq!(
            grid.cell_at(0, 0),
            Some(Cell::new(monday(), SlotTime::AllDay))
        );
        assert_eq!(grid.cell_at(7, 9), None);
        assert_eq!(grid.cell_at(0, 21), None);
    }

    #[test]
    fn week_start_is_monday() {
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(week_start_of(sunday), monday());
        assert_eq!(week_start_of(monday()), monday());
    }
}
