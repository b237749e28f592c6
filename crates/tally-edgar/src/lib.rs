//! SEC EDGAR implementations of the Tally fetcher capabilities.
//!
//! [`EdgarClient`] implements [`DocumentFetcher`] for archive documents and
//! [`FilingIndexFetcher`] over the submissions JSON feed, merging the
//! primary page with every overflow page. All requests carry the configured
//! User-Agent/contact string (EDGAR rejects anonymous clients) and are paced
//! by a shared rate limiter.

mod limiter;
mod submissions;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tally_core::fetch::{
  DocumentFetcher, FetchError, FetchedDocument, FilingIndex,
  FilingIndexFetcher,
};
use thiserror::Error;

use crate::{limiter::RateLimiter, submissions::Submissions};

const SUBMISSIONS_BASE: &str = "https://data.sec.gov/submissions";

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EdgarConfig {
  /// Identification string EDGAR requires, e.g. `tally admin@example.com`.
  pub user_agent: String,
  /// Minimum delay between consecutive requests.
  pub min_delay:  Duration,
  /// Ticker (lowercase) to zero-padded 10-digit CIK.
  pub ciks:       HashMap<String, String>,
}

impl EdgarConfig {
  pub fn new(user_agent: impl Into<String>) -> Self {
    Self {
      user_agent: user_agent.into(),
      min_delay:  Duration::from_millis(150),
      ciks:       HashMap::new(),
    }
  }

  pub fn with_cik(
    mut self,
    ticker: impl Into<String>,
    cik: impl Into<String>,
  ) -> Self {
    self.ciks.insert(ticker.into().to_lowercase(), cik.into());
    self
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct EdgarClient {
  http:    reqwest::Client,
  ciks:    HashMap<String, String>,
  limiter: RateLimiter,
}

impl EdgarClient {
  pub fn new(config: EdgarConfig) -> Result<Self, Error> {
    let http = reqwest::Client::builder()
      .user_agent(&config.user_agent)
      .timeout(Duration::from_secs(30))
      .build()?;

    Ok(Self {
      http,
      ciks: config.ciks,
      limiter: RateLimiter::new(config.min_delay),
    })
  }

  fn cik_for(&self, entity_id: &str) -> Result<&str, FetchError> {
    self
      .ciks
      .get(&entity_id.to_lowercase())
      .map(String::as_str)
      .ok_or_else(|| FetchError::UnknownEntity(entity_id.to_owned()))
  }

  async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
    self.limiter.acquire().await;

    let response =
      self.http.get(url).send().await.map_err(|e| FetchError::Transport {
        url:     url.to_owned(),
        message: e.to_string(),
      })?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status { status: status.as_u16(), url: url.to_owned() });
    }
    Ok(response)
  }

  async fn get_page(
    &self,
    url: &str,
  ) -> Result<submissions::FilingPage, FetchError> {
    let response = self.get(url).await?;
    response
      .json()
      .await
      .map_err(|e| FetchError::Decode(format!("{url}: {e}")))
  }
}

#[async_trait]
impl DocumentFetcher for EdgarClient {
  async fn fetch_document(
    &self,
    url: &str,
  ) -> Result<FetchedDocument, FetchError> {
    let response = self.get(url).await?;

    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .unwrap_or("text/html")
      .to_owned();

    let bytes = response.bytes().await.map_err(|e| FetchError::Transport {
      url:     url.to_owned(),
      message: e.to_string(),
    })?;

    tracing::debug!(url, bytes = bytes.len(), "document fetched");
    Ok(FetchedDocument { url: url.to_owned(), content_type, bytes })
  }
}

#[async_trait]
impl FilingIndexFetcher for EdgarClient {
  async fn filing_index(
    &self,
    entity_id: &str,
  ) -> Result<FilingIndex, FetchError> {
    let cik = self.cik_for(entity_id)?.to_owned();
    let url = format!("{SUBMISSIONS_BASE}/CIK{cik}.json");

    let response = self.get(&url).await?;
    let subs: Submissions = response
      .json()
      .await
      .map_err(|e| FetchError::Decode(format!("{url}: {e}")))?;

    let mut entries = subs.filings.recent.entries();
    for file in &subs.filings.files {
      let page_url = format!("{SUBMISSIONS_BASE}/{}", file.name);
      let page = self.get_page(&page_url).await?;
      entries.extend(page.entries());
    }

    tracing::info!(
      entity_id,
      cik,
      entries = entries.len(),
      overflow_pages = subs.filings.files.len(),
      "filing index loaded"
    );

    Ok(FilingIndex { cik, entries })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_ticker_is_rejected() {
    let client = EdgarClient::new(EdgarConfig::new("tally test@example.com"))
      .expect("client builds");
    assert!(matches!(
      client.cik_for("zzzz"),
      Err(FetchError::UnknownEntity(_))
    ));
  }

  #[test]
  fn ticker_lookup_is_case_insensitive() {
    let config = EdgarConfig::new("tally test@example.com")
      .with_cik("MSTR", "0001050446");
    let client = EdgarClient::new(config).expect("client builds");
    assert_eq!(client.cik_for("MsTr").unwrap(), "0001050446");
  }
}
