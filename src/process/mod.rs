// src/process/mod.rs

pub mod filter;
pub mod record;
pub mod rows;
pub mod series;

use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::{error::Error, population::PopulationTable};
use filter::RowFilter;
use record::{DailyRecord, DayCounts, WindowTotals};
use rows::RawRow;
use series::{AggregateStore, EntitySeries, STATEWIDE};

/// Outcome of folding one date into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateSummary {
    pub rows_seen: usize,
    pub counties: usize,
}

/// A county's derived record for one date, not yet committed.
struct CountyDay<'a> {
    county: &'a str,
    counts: DayCounts,
    windows: WindowTotals,
    record: DailyRecord,
}

/// Folds daily snapshots into per-county and statewide series.
pub struct Aggregator<'a> {
    populations: &'a PopulationTable,
    filter: &'a RowFilter,
}

impl<'a> Aggregator<'a> {
    pub fn new(populations: &'a PopulationTable, filter: &'a RowFilter) -> Self {
        Self {
            populations,
            filter,
        }
    }

    /// Fold every qualifying row for `date` into `store`.
    ///
    /// Dates must arrive in increasing order. Either every qualifying row
    /// lands (with the statewide record) or, on error, nothing does.
    pub fn fold_date(
        &self,
        store: &mut AggregateStore,
        date: NaiveDate,
        rows: &[RawRow],
    ) -> Result<DateSummary, Error> {
        let accepted = self.filter.apply(rows);
        if accepted.is_empty() {
            warn!(
                %date,
                rows = rows.len(),
                state = self.filter.state(),
                "snapshot has no qualifying rows; continuing"
            );
            return Ok(DateSummary {
                rows_seen: rows.len(),
                counties: 0,
            });
        }

        // 1) derive every county from prior dates only
        let mut seen = HashSet::with_capacity(accepted.len());
        let mut days = Vec::with_capacity(accepted.len());
        for row in accepted {
            if !seen.insert(row.county.as_str()) {
                return Err(Error::DuplicateRow {
                    county: row.county.clone(),
                    date,
                });
            }
            days.push(self.derive_county(store.series(&row.county), date, row)?);
        }

        // 2) statewide is a sum over counties, derived once
        let overflow = || Error::CountOverflow {
            entity: STATEWIDE.to_string(),
            date,
        };
        let mut counts = DayCounts::default();
        let mut windows = WindowTotals::default();
        for day in &days {
            counts = counts.checked_add(&day.counts).ok_or_else(overflow)?;
            windows = windows.checked_add(&day.windows).ok_or_else(overflow)?;
        }
        let statewide = DailyRecord::statewide(counts, windows, self.populations.statewide())
            .ok_or_else(overflow)?;

        // 3) commit
        let counties = days.len();
        for day in days {
            store.insert(day.county, date, day.record);
        }
        store.insert(STATEWIDE, date, statewide);

        debug!(
            %date,
            counties,
            cases = counts.cases,
            new_cases = counts.new_cases,
            "folded date"
        );
        Ok(DateSummary {
            rows_seen: rows.len(),
            counties,
        })
    }

    fn derive_county<'r>(
        &self,
        history: Option<&EntitySeries>,
        date: NaiveDate,
        row: &'r RawRow,
    ) -> Result<CountyDay<'r>, Error> {
        let population =
            self.populations
                .county(&row.county)
                .ok_or_else(|| Error::UnknownEntity {
                    county: row.county.clone(),
                    date,
                })?;
        let cases = row.confirmed(date)?;
        let deaths = row.deaths(date)?;

        let overflow = || Error::CountOverflow {
            entity: row.county.clone(),
            date,
        };

        let yesterday = history.and_then(|s| s.previous(date));
        let delta = |today: i64, pick: fn(&DailyRecord) -> i64| match yesterday {
            Some(y) => today.checked_sub(pick(y)).ok_or_else(overflow),
            None => Ok(0),
        };
        let counts = DayCounts {
            cases,
            new_cases: delta(cases, |r| r.cases)?,
            deaths,
            new_deaths: delta(deaths, |r| r.deaths)?,
        };

        // prior days in the window plus today
        let window = |days_back: u64, pick: fn(&DailyRecord) -> i64, today: i64| {
            history
                .map_or(Some(0), |s| s.trailing_sum(date, days_back, pick))
                .and_then(|prior| prior.checked_add(today))
                .ok_or_else(overflow)
        };
        let windows = WindowTotals {
            past_14_days_new_cases: window(13, |r| r.new_cases, counts.new_cases)?,
            past_14_days_new_deaths: window(13, |r| r.new_deaths, counts.new_deaths)?,
            past_7_days_new_cases: window(6, |r| r.new_cases, counts.new_cases)?,
        };
        let record = DailyRecord::county(counts, &windows, population).ok_or_else(overflow)?;

        Ok(CountyDay {
            county: &row.county,
            counts,
            windows,
            record,
        })
    }
}
