use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::{btree_map, BTreeMap};

use super::record::DailyRecord;

/// Key of the synthetic statewide entity.
pub const STATEWIDE: &str = "STATEWIDE";

/// One entity's records keyed by date. Serializes as `{"YYYY-MM-DD": {..}}`
/// in date order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EntitySeries {
    records: BTreeMap<NaiveDate, DailyRecord>,
}

impl EntitySeries {
    pub fn get(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.records.get(&date)
    }

    /// The record for the calendar day before `date`, if one exists.
    pub fn previous(&self, date: NaiveDate) -> Option<&DailyRecord> {
        date.checked_sub_days(Days::new(1)).and_then(|d| self.get(d))
    }

    /// Sum `pick` over records dated `date - 1 ..= date - days_back`.
    /// Missing days are skipped, not zero-filled. `None` on overflow.
    pub fn trailing_sum(
        &self,
        date: NaiveDate,
        days_back: u64,
        pick: impl Fn(&DailyRecord) -> i64,
    ) -> Option<i64> {
        (1..=days_back)
            .filter_map(|offset| date.checked_sub_days(Days::new(offset)))
            .filter_map(|d| self.get(d))
            .try_fold(0i64, |acc, r| acc.checked_add(pick(r)))
    }

    pub(crate) fn insert(&mut self, date: NaiveDate, record: DailyRecord) {
        self.records.insert(date, record);
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.records.keys().copied()
    }

    pub fn last(&self) -> Option<(&NaiveDate, &DailyRecord)> {
        self.records.last_key_value()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Every entity's series. Grows one date at a time and never shrinks.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStore {
    series: BTreeMap<String, EntitySeries>,
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateStore {
    /// An empty store holding only the (empty) statewide series.
    pub fn new() -> Self {
        let mut series = BTreeMap::new();
        series.insert(STATEWIDE.to_string(), EntitySeries::default());
        Self { series }
    }

    pub fn series(&self, entity: &str) -> Option<&EntitySeries> {
        self.series.get(entity)
    }

    pub fn statewide(&self) -> &EntitySeries {
        // present from construction
        &self.series[STATEWIDE]
    }

    pub fn record(&self, entity: &str, date: NaiveDate) -> Option<&DailyRecord> {
        self.series(entity).and_then(|s| s.get(date))
    }

    pub(crate) fn insert(&mut self, entity: &str, date: NaiveDate, record: DailyRecord) {
        self.series
            .entry(entity.to_string())
            .or_default()
            .insert(date, record);
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, EntitySeries> {
        self.series.iter()
    }

    /// Number of series, statewide included.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
