//! The two candidate-producing channels, tried in fixed priority order:
//! browser automation first, direct HTTP second.

use crate::pool::PagePool;
use crate::serp;
use std::sync::Arc;
use webgather_core::{Candidate, Error, PipelineConfig, Result, SearchChannel};

/// Realistic browser header values for the direct-HTTP channel. A bare
/// client UA gets served bot-wall pages instead of results.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Drives the search engine through a pooled browser page and scrapes the
/// rendered result list.
pub struct BrowserChannel {
    pool: Arc<PagePool>,
    cfg: PipelineConfig,
}

impl BrowserChannel {
    pub fn new(pool: Arc<PagePool>, cfg: PipelineConfig) -> Self {
        Self { pool, cfg }
    }

    async fn attempt(&self, query_url: &str, top_k: usize) -> Result<Vec<Candidate>> {
        let mut page = self.pool.acquire().await?;
        let navigated = page
            .goto(query_url, self.cfg.timeout(), Some(serp::RESULT_SELECTOR))
            .await;
        // The handle goes back in every path; a failed navigation must not
        // leak the slot.
        self.pool.release(page).await;
        let html = navigated?;
        Ok(serp::parse_vendor_results(&html, top_k))
    }
}

#[async_trait::async_trait]
impl SearchChannel for BrowserChannel {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn search(&self, keyword: &str, top_k: usize) -> Result<Vec<Candidate>> {
        let url = serp::query_url(&self.cfg.engine_base_url, keyword)?;

        let mut last_err: Option<Error> = None;
        for attempt in 0..self.cfg.max_retry.max(1) {
            match self.attempt(url.as_str(), top_k).await {
                Ok(candidates) => {
                    // A page that loaded but shows no result nodes is a
                    // structural mismatch: retrying the same markup cannot
                    // help, so hand the keyword to the next channel.
                    tracing::debug!(
                        keyword,
                        count = candidates.len(),
                        "browser channel parsed results"
                    );
                    return Ok(candidates);
                }
                Err(e) => {
                    tracing::debug!(keyword, attempt, error = %e, "browser attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Search("browser channel produced nothing".into())))
    }
}

/// Fetches the results page with one plain GET and scrapes it with both
/// markup heuristics.
pub struct HttpChannel {
    client: reqwest::Client,
    cfg: PipelineConfig,
}

impl HttpChannel {
    pub fn new(client: reqwest::Client, cfg: PipelineConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait::async_trait]
impl SearchChannel for HttpChannel {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn search(&self, keyword: &str, top_k: usize) -> Result<Vec<Candidate>> {
        let url = serp::query_url(&self.cfg.engine_base_url, keyword)?;

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .timeout(self.cfg.timeout())
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("engine HTTP {status}")));
        }
        let html = resp.text().await.map_err(|e| Error::Search(e.to_string()))?;

        let candidates = serp::parse_results(&html, top_k);
        tracing::debug!(keyword, count = candidates.len(), "http channel parsed results");
        Ok(candidates)
    }
}
