use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::error::Error;

const STATE_COLUMN: &str = "Province_State";
const COUNTY_COLUMN: &str = "Admin2";
const CONFIRMED_COLUMN: &str = "Confirmed";
const DEATHS_COLUMN: &str = "Deaths";

/// A cumulative count as it appeared upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Count {
    Value(i64),
    /// Blank, non-numeric, negative or out of range; holds the raw text.
    Malformed(String),
}

impl Count {
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if let Ok(v) = s.parse::<i64>() {
            return if v >= 0 {
                Count::Value(v)
            } else {
                Count::Malformed(s.to_string())
            };
        }
        // some report days carry integral floats like "12.0"; 2^63 itself
        // does not fit, hence the strict upper bound
        match s.parse::<f64>() {
            Ok(f) if (0.0..i64::MAX as f64).contains(&f) && f.fract() == 0.0 => {
                Count::Value(f as i64)
            }
            _ => Count::Malformed(s.to_string()),
        }
    }
}

/// One county's line in a daily snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub state: String,
    pub county: String,
    pub confirmed: Count,
    pub deaths: Count,
}

impl RawRow {
    pub fn new(state: &str, county: &str, confirmed: i64, deaths: i64) -> Self {
        Self {
            state: state.to_string(),
            county: county.to_string(),
            confirmed: Count::Value(confirmed),
            deaths: Count::Value(deaths),
        }
    }

    pub fn confirmed(&self, date: NaiveDate) -> Result<i64, Error> {
        self.count(date, CONFIRMED_COLUMN, &self.confirmed)
    }

    pub fn deaths(&self, date: NaiveDate) -> Result<i64, Error> {
        self.count(date, DEATHS_COLUMN, &self.deaths)
    }

    fn count(&self, date: NaiveDate, field: &'static str, count: &Count) -> Result<i64, Error> {
        match count {
            Count::Value(v) => Ok(*v),
            Count::Malformed(raw) => Err(Error::MalformedRow {
                date,
                state: self.state.clone(),
                county: self.county.clone(),
                field,
                value: raw.clone(),
            }),
        }
    }
}

struct Columns {
    state: usize,
    county: usize,
    confirmed: usize,
    deaths: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Option<Self> {
        let find = |name: &str| headers.iter().position(|h| clean_header(h) == name);
        Some(Self {
            state: find(STATE_COLUMN)?,
            county: find(COUNTY_COLUMN)?,
            confirmed: find(CONFIRMED_COLUMN)?,
            deaths: find(DEATHS_COLUMN)?,
        })
    }
}

/// Strip whitespace and a UTF-8 BOM, which the upstream files sometimes
/// carry on their first header.
fn clean_header(raw: &str) -> &str {
    raw.trim().trim_start_matches('\u{feff}')
}

/// Parse one daily-report CSV body into rows.
///
/// Counts are not validated here: a bad count only matters if the row
/// survives the state filter, so it is kept as [`Count::Malformed`].
pub fn parse_snapshot(date: NaiveDate, data: &[u8]) -> Result<Vec<RawRow>, Error> {
    let csv_err = |source| Error::Csv { date, source };

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let Some(cols) = Columns::locate(&headers) else {
        debug!(%date, ?headers, "snapshot lacks county-level columns");
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(csv_err)?;
        let field = |i: usize| rec.get(i).unwrap_or("");
        rows.push(RawRow {
            state: field(cols.state).to_string(),
            county: field(cols.county).to_string(),
            confirmed: Count::parse(field(cols.confirmed)),
            deaths: Count::parse(field(cols.deaths)),
        });
    }
    debug!(%date, rows = rows.len(), "parsed snapshot");
    Ok(rows)
}
