use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::{collections::HashMap, io::Read, path::Path};
use tracing::info;

#[derive(Debug, Deserialize)]
struct PopulationRecord {
    county: String,
    population: u64,
}

/// County populations plus their statewide sum. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationTable {
    counties: HashMap<String, u64>,
    statewide: u64,
}

impl PopulationTable {
    pub fn new(counties: HashMap<String, u64>) -> Result<Self> {
        if counties.is_empty() {
            bail!("population table is empty");
        }
        if let Some((name, _)) = counties.iter().find(|(_, p)| **p == 0) {
            bail!("county {:?} has a zero population", name);
        }
        let statewide = counties.values().sum();
        Ok(Self {
            counties,
            statewide,
        })
    }

    /// Load from a CSV with a `county,population` header.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening population file {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("reading population file {}", path.display()))?;
        info!(
            path = %path.display(),
            counties = table.len(),
            statewide = table.statewide(),
            "loaded populations"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let mut counties = HashMap::new();
        for (line, rec) in rdr.deserialize::<PopulationRecord>().enumerate() {
            let rec = rec.with_context(|| format!("population record {}", line + 1))?;
            if counties.insert(rec.county.clone(), rec.population).is_some() {
                bail!("county {:?} listed twice", rec.county);
            }
        }
        Self::new(counties)
    }

    pub fn county(&self, name: &str) -> Option<u64> {
        self.counties.get(name).copied()
    }

    pub fn statewide(&self) -> u64 {
        self.statewide
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }
}
