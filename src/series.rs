//! Dense time-series reconstruction for the totals-sequence endpoint
//!
//! The data store holds sparse per-day cumulative rows; the chart renderer
//! wants one point per calendar day. Gaps are filled by repeating the last
//! known snapshot, and a parallel sequence of day-over-day deltas is derived
//! for each metric.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

/// One per-day aggregate row for a single location.
///
/// `entry_date` may carry time-of-day noise from the data store; all
/// calendar logic here uses only the UTC calendar date.
#[derive(Debug, Clone)]
pub struct DailyRecord {
    pub entry_date: DateTime<Utc>,
    pub total: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub active: i64,
}

/// Response shape consumed by the chart renderer: parallel arrays, all the
/// same length. `entry_date` holds ISO `YYYY-MM-DD` strings; the `d`-prefixed
/// arrays hold the daily deltas of their counterparts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaseSeries {
    pub entry_date: Vec<String>,
    pub total: Vec<i64>,
    pub deaths: Vec<i64>,
    pub recovered: Vec<i64>,
    pub active: Vec<i64>,
    pub dtotal: Vec<i64>,
    pub ddeaths: Vec<i64>,
    pub drecovered: Vec<i64>,
    pub dactive: Vec<i64>,
}

/// Densify an ordered run of records into one snapshot per calendar day and
/// derive the per-metric daily deltas.
///
/// `records` must be sorted ascending by entry date with no duplicate dates.
/// With `exclude_last_as_provisional` set, the most recent day is left out
/// of the dense output because its data is still coming in; production
/// callers always pass `true`. A consequence, preserved deliberately: input
/// covering a single distinct date yields an empty series.
///
/// Deltas may be negative (data corrections) and are never clamped.
pub fn reconstruct(records: &[DailyRecord], exclude_last_as_provisional: bool) -> Result<CaseSeries> {
    let first = match records.first() {
        Some(record) => record.entry_date.date_naive(),
        None => return Err(Error::EmptyInput),
    };
    let last = records[records.len() - 1].entry_date.date_naive();
    let end = if exclude_last_as_provisional {
        last
    } else {
        last + Duration::days(1)
    };

    let mut series = CaseSeries::default();
    let mut day = first;
    let mut i = 0;
    while day < end {
        let record = &records[i];
        series.entry_date.push(day.format("%Y-%m-%d").to_string());
        series.total.push(record.total);
        series.deaths.push(record.deaths);
        series.recovered.push(record.recovered);
        series.active.push(record.active);

        // The read index only advances when the next record lands exactly on
        // the next calendar day; a gap repeats the previous snapshot.
        day = day + Duration::days(1);
        if let Some(next) = records.get(i + 1) {
            if next.entry_date.date_naive() == day {
                i += 1;
            }
        }
    }

    series.dtotal = deltas(&series.total);
    series.ddeaths = deltas(&series.deaths);
    series.drecovered = deltas(&series.recovered);
    series.dactive = deltas(&series.active);

    Ok(series)
}

/// Day-over-day differences with an implicit 0 before the first value.
fn deltas(dense: &[i64]) -> Vec<i64> {
    let mut last = 0;
    dense
        .iter()
        .map(|&value| {
            let delta = value - last;
            last = value;
            delta
        })
        .collect()
}
