use std::collections::HashSet;

use super::rows::RawRow;

/// Selects the rows of one state, minus excluded pseudo-counties.
#[derive(Debug, Clone)]
pub struct RowFilter {
    state: String,
    excluded: HashSet<String>,
}

impl RowFilter {
    pub fn new<I, S>(state: impl Into<String>, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: state.into(),
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn accepts(&self, row: &RawRow) -> bool {
        row.state == self.state && !self.excluded.contains(&row.county)
    }

    pub fn apply<'a>(&self, rows: &'a [RawRow]) -> Vec<&'a RawRow> {
        rows.iter().filter(|r| self.accepts(r)).collect()
    }
}
