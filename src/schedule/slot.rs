// src/schedule/slot.rs

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Appointment;

/// Label stored for appointments that have a day but no specific hour.
pub const ALL_DAY_LABEL: &str = "Toute la journée";

/// First and last hour rows offered by the week grid.
pub const FIRST_HOUR: u8 = 5;
pub const LAST_HOUR: u8 = 20;

/// Bucket number used for the all-day row.
pub const ALL_DAY_BUCKET: u32 = 0;

static HOUR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)h").expect("hour pattern is valid")
});

static STRICT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})h(00)?$").expect("strict label pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("time label is empty")]
    Empty,
    #[error("unrecognised time label '{0}'")]
    Unrecognised(String),
    #[error("hour {0} is outside the schedule (5h00 to 20h00)")]
    OutOfRange(u32),
}

/// A schedulable time slot within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "hour")]
pub enum SlotTime {
    AllDay,
    Hour(u8),
}

impl SlotTime {
    /// Strict parse used when a label enters the system.
    pub fn parse(label: &str) -> Result<Self, SlotError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(SlotError::Empty);
        }
        if label == ALL_DAY_LABEL {
            return Ok(SlotTime::AllDay);
        }

        let caps = STRICT_LABEL
            .captures(label)
            .ok_or_else(|| SlotError::Unrecognised(label.to_string()))?;
        let hour: u32 = caps[1]
            .parse()
            .map_err(|_| SlotError::Unrecognised(label.to_string()))?;

        Self::hour(hour)
    }

    /// A concrete hour slot, rejecting hours the grid does not show.
    pub fn hour(hour: u32) -> Result<Self, SlotError> {
        if (FIRST_HOUR as u32..=LAST_HOUR as u32).contains(&hour) {
            Ok(SlotTime::Hour(hour as u8))
        } else {
            Err(SlotError::OutOfRange(hour))
        }
    }

    /// Decode a grid bucket (`0` is all-day).
    pub fn from_bucket(bucket: u32) -> Result<Self, SlotError> {
        if bucket == ALL_DAY_BUCKET {
            Ok(SlotTime::AllDay)
        } else {
            Self::hour(bucket)
        }
    }

    pub fn bucket(self) -> u32 {
        match self {
            SlotTime::AllDay => ALL_DAY_BUCKET,
            SlotTime::Hour(h) => h as u32,
        }
    }

    pub fn label(self) -> String {
        encode_bucket(self.bucket())
    }

    /// Every slot of a day in display order: all-day row first, then hours.
    pub fn all() -> impl Iterator<Item = SlotTime> {
        std::iter::once(SlotTime::AllDay).chain((FIRST_HOUR..=LAST_HOUR).map(SlotTime::Hour))
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// How a stored time label reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelKind {
    Missing,
    AllDay,
    Hour(u32),
    Unparsed(String),
}

pub fn classify(label: Option<&str>) -> LabelKind {
    let Some(label) = label else {
        return LabelKind::Missing;
    };
    if label == ALL_DAY_LABEL {
        return LabelKind::AllDay;
    }

    match HOUR_PATTERN
        .captures(label)
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        Some(h) => LabelKind::Hour(h),
        None => LabelKind::Unparsed(label.to_string()),
    }
}

/// Hour bucket of a stored label. Anything that is not an hour reads as all-day.
pub fn hour_bucket(label: Option<&str>) -> u32 {
    match classify(label) {
        LabelKind::Hour(h) => h,
        LabelKind::Missing | LabelKind::AllDay | LabelKind::Unparsed(_) => ALL_DAY_BUCKET,
    }
}

/// Bucket `0` encodes to the all-day label, any other `H` to `"{H}h00"`.
pub fn encode_bucket(bucket: u32) -> String {
    if bucket == ALL_DAY_BUCKET {
        ALL_DAY_LABEL.to_string()
    } else {
        format!("{bucket}h00")
    }
}

/// Calendar-day equality; the time of day is ignored.
///
/// Days are UTC days. This server stores moved appointments at midnight UTC
/// (`Cell::scheduled_at`); a date written at local midnight (Europe/Paris) by
/// another writer reads as the previous day.
pub fn same_day(a: DateTime<Utc>, b: NaiveDate) -> bool {
    a.date_naive() == b
}

/// One (day, slot) intersection of the week grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub day: NaiveDate,
    pub slot: SlotTime,
}

impl Cell {
    pub fn new(day: NaiveDate, slot: SlotTime) -> Self {
        Self { day, slot }
    }

    /// The cell an appointment currently occupies.
    /// `None` when it has no date or its hour is not on the grid.
    pub fn of(appointment: &Appointment) -> Option<Self> {
        let date = appointment.scheduled_date?;
        let slot = SlotTime::from_bucket(hour_bucket(appointment.scheduled_time_label.as_deref())).ok()?;
        Some(Self::new(date.date_naive(), slot))
    }

    pub fn contains(&self, appointment: &Appointment) -> bool {
        let Some(date) = appointment.scheduled_date else {
            return false;
        };
        same_day(date, self.day)
            && hour_bucket(appointment.scheduled_time_label.as_deref()) == self.slot.bucket()
    }

    /// Absolute date written to the record when an appointment moves here.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.day.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}
