use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("navigation failed: {0}")]
    Navigate(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("extraction failed: {0}")]
    Extract(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("page pool error: {0}")]
    Pool(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A fully hydrated search result as returned to callers.
///
/// `link` is the identity within a result set: every set produced by the
/// orchestrator holds pairwise-distinct links. `content` is either real
/// extracted text or empty; rejected candidates are dropped, never marked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub content: String,
}

impl SearchResult {
    pub fn from_candidate(c: Candidate) -> Self {
        Self {
            title: c.title,
            summary: c.summary,
            link: c.link,
            content: String::new(),
        }
    }
}

/// A raw (title, link, summary) triple produced by one channel attempt,
/// before any content extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub link: String,
    pub summary: String,
}

/// Normalize a link for identity comparisons (dedup keys).
///
/// Best-effort: parseable URLs lose fragments and trailing slashes on empty
/// paths; anything unparseable is compared as trimmed text.
pub fn normalize_link(link: &str) -> String {
    match url::Url::parse(link.trim()) {
        Ok(mut u) => {
            u.set_fragment(None);
            let s = u.to_string();
            s.strip_suffix('/')
                .filter(|_| u.path() == "/" && u.query().is_none())
                .map(|p| p.to_string())
                .unwrap_or(s)
        }
        Err(_) => link.trim().to_string(),
    }
}

/// One strategy for obtaining raw search candidates for a keyword.
///
/// Implementations own their structural assumptions about the engine's
/// markup; drift is absorbed here, not in the pipeline.
#[async_trait::async_trait]
pub trait SearchChannel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, keyword: &str, top_k: usize) -> Result<Vec<Candidate>>;
}

/// One browser automation surface. Exactly one caller owns a surface
/// between pool acquire and release; surfaces are never shared.
#[async_trait::async_trait]
pub trait PageSurface: Send {
    /// Navigate and return the rendered HTML. Waits for the page `load`
    /// lifecycle event, plus `wait_selector` when given.
    async fn goto(
        &mut self,
        url: &str,
        timeout: Duration,
        wait_selector: Option<&str>,
    ) -> Result<String>;

    /// Return the surface to a neutral blank state so it can be reused.
    async fn reset(&mut self) -> Result<()>;

    /// Terminate the surface. Idempotent; errors are swallowed.
    async fn close(&mut self);
}

/// Creates new page surfaces for the pool.
#[async_trait::async_trait]
pub trait PageFactory: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageSurface>>;
}

/// The consumed text-generation capability. Stateless per call and safe for
/// concurrent use; callers treat failure as empty text and apply their own
/// fallbacks.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u64) -> Result<String>;
}

/// Pipeline configuration. Loading (files, env) is the caller's concern;
/// this struct is the interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Search engine base URL; queries go to `{base}/search?q=...`.
    pub engine_base_url: String,
    /// Per navigation/HTTP call timeout.
    pub timeout_ms: u64,
    /// Retry ceiling per stage (channel attempt, extraction attempt).
    pub max_retry: usize,
    /// LLM validation sub-loop iteration ceiling.
    pub max_iter: usize,
    /// Nominal cap on concurrently allocated page surfaces.
    pub max_pages: usize,
    /// Default result-set width.
    pub top_k: usize,
    /// Character budget for optional summaries.
    pub max_summary_chars: usize,
    /// Headless browser mode.
    pub headless: bool,
    /// Run the extraction engine over candidates. When false, candidates
    /// are returned with empty content.
    pub hydrate: bool,
    /// Opt-in LLM yes/no validation of extracted text.
    pub validate_extracted: bool,
    /// Opt-in LLM summarization of extracted text.
    pub summarize_extracted: bool,
    /// Pool acquire poll interval while waiting for a free surface.
    pub acquire_poll_ms: u64,
    /// Poll attempts before the pool over-provisions past `max_pages`.
    pub acquire_retries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine_base_url: "https://www.bing.com".to_string(),
            timeout_ms: 30_000,
            max_retry: 3,
            max_iter: 3,
            max_pages: 4,
            top_k: 5,
            max_summary_chars: 150,
            headless: true,
            hydrate: true,
            validate_extracted: false,
            summarize_extracted: false,
            acquire_poll_ms: 200,
            acquire_retries: 50,
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn acquire_poll(&self) -> Duration {
        Duration::from_millis(self.acquire_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_serializes_with_flat_shape() {
        let r = SearchResult {
            title: "T".to_string(),
            summary: "S".to_string(),
            link: "https://example.com/a".to_string(),
            content: String::new(),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["title"].as_str(), Some("T"));
        assert_eq!(v["summary"].as_str(), Some("S"));
        assert_eq!(v["link"].as_str(), Some("https://example.com/a"));
        assert_eq!(v["content"].as_str(), Some(""));
        assert_eq!(v.as_object().unwrap().len(), 4);
    }

    #[test]
    fn normalize_link_drops_fragment_and_root_slash() {
        assert_eq!(
            normalize_link("https://example.com/a#frag"),
            "https://example.com/a"
        );
        assert_eq!(normalize_link("https://example.com/"), "https://example.com");
        assert_eq!(
            normalize_link("https://example.com/?q=1"),
            "https://example.com/?q=1"
        );
    }

    #[test]
    fn normalize_link_keeps_unparseable_text() {
        assert_eq!(normalize_link("  not a url  "), "not a url");
    }

    #[test]
    fn default_config_matches_documented_knobs() {
        let c = PipelineConfig::default();
        assert_eq!(c.engine_base_url, "https://www.bing.com");
        assert_eq!(c.timeout_ms, 30_000);
        assert_eq!(c.max_retry, 3);
        assert_eq!(c.max_iter, 3);
        assert_eq!(c.max_pages, 4);
        assert_eq!(c.top_k, 5);
        assert!(c.headless);
        assert!(c.hydrate);
        assert!(!c.validate_extracted);
        assert!(!c.summarize_extracted);
    }
}
