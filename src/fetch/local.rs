use async_trait::async_trait;
use chrono::NaiveDate;
use std::{io::ErrorKind, path::PathBuf};
use tokio::fs;
use tracing::debug;

use super::{report_file_name, Snapshot, SnapshotSource};
use crate::{error::Error, process::rows::parse_snapshot};

/// Reads `MM-DD-YYYY.csv` daily reports from a local directory, e.g. a
/// checkout of the upstream repository. A missing file ends the series.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SnapshotSource for DirectorySource {
    async fn snapshot(&self, date: NaiveDate) -> Result<Snapshot, Error> {
        let path = self.dir.join(report_file_name(date));
        match fs::read(&path).await {
            Ok(data) => Ok(Snapshot::Available(parse_snapshot(date, &data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no report on disk");
                Ok(Snapshot::EndOfSeries)
            }
            Err(e) => Err(Error::Transport {
                date,
                source: Box::new(e),
            }),
        }
    }
}
