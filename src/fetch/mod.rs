// src/fetch/mod.rs

pub mod http;
pub mod local;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{error::Error, process::rows::RawRow};

pub use http::HttpSource;
pub use local::DirectorySource;

/// What a source holds for one date. Transport failures are the `Err` arm
/// of [`SnapshotSource::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Available(Vec<RawRow>),
    /// The feed has stopped publishing; normal termination.
    EndOfSeries,
}

/// Date-indexed provider of daily report rows.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, date: NaiveDate) -> Result<Snapshot, Error>;
}

/// Substitute `{yyyy}`, `{mm}` and `{dd}` in `template`.
pub fn format_date_template(template: &str, date: NaiveDate) -> String {
    template
        .replace("{yyyy}", &date.format("%Y").to_string())
        .replace("{mm}", &date.format("%m").to_string())
        .replace("{dd}", &date.format("%d").to_string())
}

/// `MM-DD-YYYY.csv`, the upstream daily report file name.
pub fn report_file_name(date: NaiveDate) -> String {
    format_date_template("{mm}-{dd}-{yyyy}.csv", date)
}
