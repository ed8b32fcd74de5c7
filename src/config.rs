// src/config.rs

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// County-level rows in the upstream daily reports begin on this date.
pub const DEFAULT_START_DATE: (i32, u32, u32) = (2020, 3, 22);

pub const DEFAULT_URL_TEMPLATE: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_daily_reports/{mm}-{dd}-{yyyy}.csv";

static DEFAULT_EXCLUDED: &[&str] = &["Unassigned", "Out of MO", "Kansas City", "Joplin"];

/// What the driver does when a date fails with a data fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DateErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub state: String,
    pub start_date: NaiveDate,
    pub url_template: String,
    /// Read `MM-DD-YYYY.csv` files from here instead of fetching over HTTP.
    pub input_dir: Option<PathBuf>,
    pub population_file: Option<PathBuf>,
    /// Placeholder and double-counted pseudo-counties. Matching rows feed no series.
    pub excluded_counties: Vec<String>,
    pub output_dir: PathBuf,
    pub on_date_error: DateErrorPolicy,
    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_START_DATE;
        Self {
            state: "Missouri".into(),
            start_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            url_template: DEFAULT_URL_TEMPLATE.into(),
            input_dir: None,
            population_file: None,
            excluded_counties: DEFAULT_EXCLUDED.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from("data"),
            on_date_error: DateErrorPolicy::Abort,
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let cfg = Self::from_yaml(&text).with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Checks that don't need the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.state.trim().is_empty() {
            bail!("state must not be empty");
        }
        if self.input_dir.is_none() {
            for placeholder in ["{yyyy}", "{mm}", "{dd}"] {
                if !self.url_template.contains(placeholder) {
                    bail!(
                        "url_template {:?} is missing the {} placeholder",
                        self.url_template,
                        placeholder
                    );
                }
            }
        }
        if self.population_file.is_none() {
            bail!("population_file is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_file_missing() {
        let cfg = Config::load_or_default(Path::new("/definitely/not/here.yaml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.start_date.to_string(), "2020-03-22");
        assert!(cfg.excluded_counties.iter().any(|c| c == "Kansas City"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "state: Kansas\nstart_date: 2020-04-01\non_date_error: skip\nfetch:\n  max_retries: 7\nexcluded_counties: [Unassigned]"
        )
        .unwrap();

        let cfg = Config::load_or_default(tmp.path()).unwrap();
        assert_eq!(cfg.state, "Kansas");
        assert_eq!(cfg.start_date, NaiveDate::from_ymd_opt(2020, 4, 1).unwrap());
        assert_eq!(cfg.on_date_error, DateErrorPolicy::Skip);
        assert_eq!(cfg.fetch.max_retries, 7);
        assert_eq!(cfg.fetch.initial_backoff_ms, 500);
        assert_eq!(cfg.excluded_counties, vec!["Unassigned".to_string()]);
        assert_eq!(cfg.url_template, DEFAULT_URL_TEMPLATE);
    }

    #[test]
    fn test_validate() {
        let mut cfg = Config::default();
        assert!(cfg.validate().is_err(), "population file is required");

        cfg.population_file = Some(PathBuf::from("pop.csv"));
        cfg.validate().unwrap();

        cfg.url_template = "https://example.com/{mm}-{dd}.csv".into();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("{yyyy}"), "{err}");

        // a local input dir makes the template irrelevant
        cfg.input_dir = Some(PathBuf::from("reports"));
        cfg.validate().unwrap();
    }
}
