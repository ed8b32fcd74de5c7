use chrono::NaiveDate;
use thiserror::Error;

/// Failures that can end the processing of a single date.
///
/// None of these are retried; the driver either aborts the run or skips
/// the date, depending on the configured policy.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{date}: county {county:?} has no population entry")]
    UnknownEntity { county: String, date: NaiveDate },

    #[error("{date}: malformed row for {county:?} ({state}): {field} = {value:?}")]
    MalformedRow {
        date: NaiveDate,
        state: String,
        county: String,
        field: &'static str,
        value: String,
    },

    #[error("{date}: county {county:?} reported more than once")]
    DuplicateRow { county: String, date: NaiveDate },

    #[error("{date}: counts for {entity:?} overflow")]
    CountOverflow { entity: String, date: NaiveDate },

    #[error("{date}: unreadable snapshot CSV")]
    Csv {
        date: NaiveDate,
        #[source]
        source: csv::Error,
    },

    #[error("{date}: snapshot transport failed")]
    Transport {
        date: NaiveDate,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// The date this failure belongs to.
    pub fn date(&self) -> NaiveDate {
        match self {
            Error::UnknownEntity { date, .. }
            | Error::MalformedRow { date, .. }
            | Error::DuplicateRow { date, .. }
            | Error::CountOverflow { date, .. }
            | Error::Csv { date, .. }
            | Error::Transport { date, .. } => *date,
        }
    }

    /// Data faults are local to one date and may be skipped; transport
    /// failures never are.
    pub fn is_data_fault(&self) -> bool {
        !matches!(self, Error::Transport { .. })
    }
}
