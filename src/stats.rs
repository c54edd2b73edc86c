// src/stats.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{RequestStatus, Urgency};
use crate::schedule::week_start_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    #[default]
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatsRecord {
    pub created_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCount {
    pub start: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    pub bucket: Bucket,
    pub total: usize,
    pub series: Vec<BucketCount>,
    pub by_status: BTreeMap<&'static str, usize>,
    pub by_urgency: BTreeMap<&'static str, usize>,
}

/// First day of the bucket containing `date`.
pub fn bucket_start(bucket: Bucket, date: NaiveDate) -> NaiveDate {
    match bucket {
        Bucket::Day => date,
        Bucket::Week => week_start_of(date),
        Bucket::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Largest series a ranged query may produce.
pub const MAX_BUCKETS: i64 = 366;

/// Number of buckets between the ones holding `from` and `to`, both included.
pub fn bucket_count(bucket: Bucket, from: NaiveDate, to: NaiveDate) -> i64 {
    let (first, last) = (bucket_start(bucket, from), bucket_start(bucket, to));
    if last < first {
        return 0;
    }
    match bucket {
        Bucket::Day => (last - first).num_days() + 1,
        Bucket::Week => (last - first).num_days() / 7 + 1,
        Bucket::Month => {
            let months = |d: NaiveDate| i64::from(d.year()) * 12 + i64::from(d.month0());
            months(last) - months(first) + 1
        }
    }
}

fn next_bucket(bucket: Bucket, start: NaiveDate) -> Option<NaiveDate> {
    match bucket {
        Bucket::Day => start.checked_add_signed(Duration::days(1)),
        Bucket::Week => start.checked_add_signed(Duration::days(7)),
        Bucket::Month => start.checked_add_months(Months::new(1)),
    }
}

/// Counts by creation date. With a range, every bucket of the range is listed,
/// empty ones included, and records outside it are left out.
pub fn summarize(
    records: &[StatsRecord],
    bucket: Bucket,
    range: Option<(NaiveDate, NaiveDate)>,
) -> RequestStats {
    let in_range = |r: &&StatsRecord| match range {
        Some((from, to)) => {
            let d = r.created_at.date_naive();
            d >= from && d <= to
        }
        None => true,
    };

    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    if let Some((from, to)) = range {
        let last = bucket_start(bucket, to);
        let mut cursor = Some(bucket_start(bucket, from));
        while let Some(start) = cursor.filter(|s| *s <= last) {
            counts.insert(start, 0);
            cursor = next_bucket(bucket, start);
        }
    }

    let mut by_status = BTreeMap::new();
    let mut by_urgency = BTreeMap::new();
    let mut total = 0;

    for r in records.iter().filter(in_range) {
        total += 1;
        *counts.entry(bucket_start(bucket, r.created_at.date_naive())).or_insert(0) += 1;
        *by_status.entry(r.status.as_str()).or_insert(0) += 1;
        *by_urgency.entry(r.urgency.as_str()).or_insert(0) += 1;
    }

    RequestStats {
        bucket,
        total,
        series: counts
            .into_iter()
            .map(|(start, count)| BucketCount { start, count })
            .collect(),
        by_status,
        by_urgency,
    }
}
