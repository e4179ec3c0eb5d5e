use std::collections::BTreeMap;

use smard_client::{Row, MISSING_READING};
use time::{Duration, OffsetDateTime};
use tracing::trace;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReduceError {
    #[error("insufficient data: need at least 2 rows to derive the interval width, got {rows}")]
    InsufficientData { rows: usize },
    #[error("division by zero: the last two rows share a timestamp")]
    DivideByZero,
}

/// Latest known average power of one column and when it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub power: i64,
    pub observed_at: OffsetDateTime,
}

impl Observation {
    pub fn observed_at_millis(&self) -> i64 {
        (self.observed_at.unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Per-column result of [`reduce`]. Columns never observed are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, Observation>,
}

impl Snapshot {
    pub fn get(&self, column: &str) -> Option<&Observation> {
        self.entries.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Observation)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Width of one reporting interval, taken from the final two rows only.
///
/// The series is assumed to be evenly spaced; irregular spacing earlier in
/// the series does not influence the result.
pub fn interval_width(rows: &[Row]) -> Result<Duration, ReduceError> {
    let [.., prev, last] = rows else {
        return Err(ReduceError::InsufficientData { rows: rows.len() });
    };

    let width = last.ts - prev.ts;
    if width.is_zero() {
        return Err(ReduceError::DivideByZero);
    }
    Ok(width)
}

/// Average power over `width` for an energy amount, truncated toward zero.
pub fn watthours_to_watts(energy: i64, width: Duration) -> Result<i64, ReduceError> {
    if width.is_zero() {
        return Err(ReduceError::DivideByZero);
    }
    let hours = width.as_seconds_f64() / 3600.0;
    Ok((energy as f64 / hours) as i64)
}

/// Reduce an ascending series to the most recent observation per column.
///
/// Rows are scanned oldest to newest and every present reading overwrites the
/// column's entry, so the last row carrying a value wins. Missing readings are
/// skipped and never clear an earlier value.
pub fn reduce(rows: &[Row]) -> Result<Snapshot, ReduceError> {
    let width = interval_width(rows)?;
    let mut snapshot = Snapshot::default();

    for row in rows {
        for (column, reading) in &row.readings {
            let Some(energy) = (*reading).filter(|&v| v != MISSING_READING) else {
                continue;
            };

            let power = watthours_to_watts(energy, width)?;
            trace!(column = %column, energy, power, ts = %row.ts, "converted reading");

            snapshot.entries.insert(
                column.clone(),
                Observation {
                    power,
                    observed_at: row.ts,
                },
            );
        }
    }

    Ok(snapshot)
}
