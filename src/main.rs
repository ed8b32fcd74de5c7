use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use covidscraper::{
    config::{Config, DateErrorPolicy},
    fetch::{DirectorySource, HttpSource, SnapshotSource},
    pipeline,
    population::PopulationTable,
    process::{filter::RowFilter, series::STATEWIDE, Aggregator},
    write::write_series,
};
use std::{env, path::PathBuf};
use tokio::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Build per-county COVID-19 JSON time series from daily case reports"
)]
struct Args {
    /// YAML config; defaults apply when the file is absent
    #[arg(short, long, default_value = "covidscraper.yaml")]
    config: PathBuf,
    /// CSV with a `county,population` header
    #[arg(short, long)]
    population: Option<PathBuf>,
    /// Read MM-DD-YYYY.csv reports from this directory instead of HTTP
    #[arg(long)]
    input_dir: Option<PathBuf>,
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    state: Option<String>,
    /// First date to request, YYYY-MM-DD
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long, value_enum)]
    on_date_error: Option<DateErrorPolicy>,
}

impl Args {
    fn apply(self, mut cfg: Config) -> Config {
        if let Some(p) = self.population {
            cfg.population_file = Some(p);
        }
        if let Some(d) = self.input_dir {
            cfg.input_dir = Some(d);
        }
        if let Some(o) = self.output {
            cfg.output_dir = o;
        }
        if let Some(s) = self.state {
            cfg.state = s;
        }
        if let Some(d) = self.start_date {
            cfg.start_date = d;
        }
        if let Some(p) = self.on_date_error {
            cfg.on_date_error = p;
        }
        cfg
    }
}

fn init_logging() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("").add_directive(log_level.parse().unwrap_or(Level::INFO.into()))
    });
    fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    let cfg = Config::load_or_default(&args.config)?;
    let cfg = args.apply(cfg);
    cfg.validate()?;
    info!(state = %cfg.state, start = %cfg.start_date, "startup");

    let population_file = cfg
        .population_file
        .as_deref()
        .context("population_file is required")?;
    let populations = PopulationTable::from_path(population_file)?;
    let filter = RowFilter::new(cfg.state.clone(), cfg.excluded_counties.iter().cloned());
    let aggregator = Aggregator::new(&populations, &filter);

    let source: Box<dyn SnapshotSource> = match &cfg.input_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "reading local reports");
            Box::new(DirectorySource::new(dir))
        }
        None => Box::new(HttpSource::new(&cfg.url_template, &cfg.fetch)?),
    };

    let start = Instant::now();
    let outcome = pipeline::run(
        source.as_ref(),
        &aggregator,
        cfg.start_date,
        cfg.on_date_error,
    )
    .await
    .context("aggregating daily reports")?;

    for skipped in &outcome.skipped {
        warn!(date = %skipped.date, error = %skipped.error, "date was skipped");
    }
    info!(
        first = %outcome.first_date,
        last = ?outcome.last_date,
        folded = outcome.dates_folded,
        empty = outcome.empty_dates.len(),
        skipped = outcome.skipped.len(),
        entities = outcome.store.len(),
        statewide_days = outcome.store.statewide().len(),
        elapsed = ?start.elapsed(),
        "aggregation finished"
    );
    if let Some((date, rec)) = outcome.store.statewide().last() {
        info!(%date, entity = STATEWIDE, cases = rec.cases, deaths = rec.deaths, "latest totals");
    }

    let files = write_series(&outcome.store, &cfg.output_dir)?;
    info!(files = files.len(), "all done");
    Ok(())
}
