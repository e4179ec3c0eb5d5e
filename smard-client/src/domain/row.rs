use std::collections::BTreeMap;

use time::OffsetDateTime;

/// Raw reading value the provider uses for "no data in this interval".
pub const MISSING_READING: i64 = -1;

/// One observation instant of a category: energy per column for the
/// interval starting at `ts`, in the provider's energy unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub ts: OffsetDateTime,
    pub readings: BTreeMap<String, Option<i64>>,
}

impl Row {
    pub fn new(ts: OffsetDateTime) -> Self {
        Self {
            ts,
            readings: BTreeMap::new(),
        }
    }

    /// Build a row from raw integer readings, decoding the sentinel into `None`.
    pub fn from_raw<I, S>(ts: OffsetDateTime, raw: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let readings = raw
            .into_iter()
            .map(|(name, value)| {
                let value = (value != MISSING_READING).then_some(value);
                (name.into(), value)
            })
            .collect();

        Self { ts, readings }
    }

    pub fn with_reading(mut self, column: impl Into<String>, value: Option<i64>) -> Self {
        self.readings.insert(column.into(), value);
        self
    }

    /// The observed reading for `column`, or `None` if absent or unset.
    pub fn reading(&self, column: &str) -> Option<i64> {
        self.readings.get(column).copied().flatten()
    }
}
