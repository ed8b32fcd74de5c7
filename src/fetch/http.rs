// src/fetch/http.rs

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::{format_date_template, Snapshot, SnapshotSource};
use crate::{config::FetchConfig, error::Error, process::rows::parse_snapshot};

/// Fetches daily reports from a URL template over HTTP.
///
/// A `404` marks the end of the series; anything else that fails is
/// retried with exponential backoff and then surfaces as a transport error.
pub struct HttpSource {
    client: Client,
    url_template: String,
    max_retries: u32,
    initial_backoff_ms: u64,
}

enum Body {
    Text(String),
    NotFound,
}

impl HttpSource {
    pub fn new(url_template: impl Into<String>, cfg: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self::with_client(client, url_template, cfg))
    }

    pub fn with_client(client: Client, url_template: impl Into<String>, cfg: &FetchConfig) -> Self {
        Self {
            client,
            url_template: url_template.into(),
            max_retries: cfg.max_retries,
            initial_backoff_ms: cfg.initial_backoff_ms,
        }
    }

    pub fn url_for(&self, date: NaiveDate) -> anyhow::Result<Url> {
        let raw = format_date_template(&self.url_template, date);
        Url::parse(&raw).with_context(|| format!("parsing snapshot URL {}", raw))
    }

    async fn get_core(&self, url: &Url) -> anyhow::Result<Body> {
        debug!("Fetching {}", url);
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Body::NotFound);
        }
        let text = resp
            .error_for_status()
            .with_context(|| format!("Non-success status {}", url))?
            .text()
            .await
            .with_context(|| format!("Reading text from {}", url))?;
        Ok(Body::Text(text))
    }

    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }

    /// A `404` is an answer, not a failure, and returns on the first try.
    async fn get_with_retry(&self, url: &Url) -> anyhow::Result<Body> {
        let mut retry = 0;
        loop {
            let err = match self.get_core(url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };
            if retry >= self.max_retries {
                error!(%url, retries = retry, error = %err, "giving up on snapshot");
                return Err(err);
            }
            retry += 1;
            let delay = self.backoff(retry);
            warn!(
                %url,
                retry,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "snapshot fetch failed; retrying"
            );
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    #[instrument(level = "debug", skip(self))]
    async fn snapshot(&self, date: NaiveDate) -> Result<Snapshot, Error> {
        let url = self
            .url_for(date)
            .map_err(|e| Error::Transport {
                date,
                source: e.into(),
            })?;
        match self.get_with_retry(&url).await {
            Ok(Body::NotFound) => {
                debug!(%url, "no report published");
                Ok(Snapshot::EndOfSeries)
            }
            Ok(Body::Text(text)) => Ok(Snapshot::Available(parse_snapshot(date, text.as_bytes())?)),
            Err(e) => Err(Error::Transport {
                date,
                source: e.into(),
            }),
        }
    }
}
