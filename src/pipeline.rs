// src/pipeline.rs

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::{
    config::DateErrorPolicy,
    error::Error,
    fetch::{Snapshot, SnapshotSource},
    process::{series::AggregateStore, Aggregator},
};

/// A date that failed and was skipped under [`DateErrorPolicy::Skip`].
#[derive(Debug)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub error: Error,
}

/// Everything the run produced; handed whole to the writer.
#[derive(Debug)]
pub struct RunOutcome {
    pub store: AggregateStore,
    pub first_date: NaiveDate,
    /// Last date that returned a snapshot, if any did.
    pub last_date: Option<NaiveDate>,
    pub dates_folded: usize,
    /// Dates with a snapshot but no qualifying rows.
    pub empty_dates: Vec<NaiveDate>,
    pub skipped: Vec<SkippedDate>,
}

/// Walk forward one day at a time from `start`, folding each snapshot into
/// a fresh store, until the source reports the end of the series.
///
/// Each date is completely folded before the next one is requested.
#[instrument(level = "info", skip(source, aggregator))]
pub async fn run<S: SnapshotSource + ?Sized>(
    source: &S,
    aggregator: &Aggregator<'_>,
    start: NaiveDate,
    policy: DateErrorPolicy,
) -> Result<RunOutcome, Error> {
    let mut store = AggregateStore::new();
    let mut last_date = None;
    let mut dates_folded = 0;
    let mut empty_dates = Vec::new();
    let mut skipped = Vec::new();

    let mut date = start;
    loop {
        let folded = match source.snapshot(date).await {
            Ok(Snapshot::EndOfSeries) => {
                info!(%date, "end of series");
                break;
            }
            Ok(Snapshot::Available(rows)) => aggregator.fold_date(&mut store, date, &rows),
            Err(e) => Err(e),
        };

        match folded {
            Ok(summary) => {
                if summary.counties == 0 {
                    empty_dates.push(date);
                }
                last_date = Some(date);
                dates_folded += 1;
                info!(%date, counties = summary.counties, rows = summary.rows_seen, "folded");
            }
            Err(e) if e.is_data_fault() && policy == DateErrorPolicy::Skip => {
                warn!(%date, error = %e, "skipping date");
                last_date = Some(date);
                skipped.push(SkippedDate { date, error: e });
            }
            Err(e) => return Err(e),
        }

        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(RunOutcome {
        store,
        first_date: start,
        last_date,
        dates_folded,
        empty_dates,
        skipped,
    })
}
