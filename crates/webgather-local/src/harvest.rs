//! Per-URL content extraction with retry, ad filtering, and the optional
//! LLM validation/summarization sub-loops.

use crate::llm::Expander;
use crate::pool::PagePool;
use crate::{extract, filter};
use std::sync::Arc;
use std::time::Duration;
use webgather_core::{Error, PipelineConfig, Result};

/// Typed extraction outcome. Placeholder strings never reach result sets:
/// callers drop `AdContent`/`Failed` candidates or keep them with empty
/// content, per their policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Harvest {
    Text(String),
    AdContent,
    Failed,
}

/// Pause between negative LLM validation verdicts.
const VALIDATE_PAUSE: Duration = Duration::from_millis(500);

/// Base unit for the attempt backoff; attempt `n` waits `n` units.
const RETRY_BACKOFF: Duration = Duration::from_millis(1_000);

/// A navigation aborted because the page kicked off another navigation
/// (redirect scripts, consent bounces). The load will usually settle, so
/// this retries without backoff.
fn is_interrupted_navigation(e: &Error) -> bool {
    matches!(e, Error::Navigate(msg) if msg.to_ascii_lowercase().contains("interrupted by another navigation"))
}

pub struct Harvester {
    pool: Arc<PagePool>,
    expander: Expander,
    cfg: PipelineConfig,
}

impl Harvester {
    pub fn new(pool: Arc<PagePool>, expander: Expander, cfg: PipelineConfig) -> Self {
        Self {
            pool,
            expander,
            cfg,
        }
    }

    /// Extract readable content from one URL. Fails closed: every outcome is
    /// a [`Harvest`], never an error, so callers can keep or drop the
    /// candidate without unwinding the pipeline.
    pub async fn extract(&self, url: &str) -> Harvest {
        let attempts = self.cfg.max_retry.max(1);
        for attempt in 0..attempts {
            let html = match self.fetch_page(url).await {
                Ok(html) => html,
                Err(e) if is_interrupted_navigation(&e) => {
                    tracing::debug!(url, "navigation interrupted; retrying immediately");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(url, attempt, error = %e, "page load failed");
                    if attempt + 1 < attempts {
                        tokio::time::sleep(RETRY_BACKOFF * (attempt as u32 + 1)).await;
                    }
                    continue;
                }
            };

            // Sponsored pages stay sponsored; no amount of retrying changes
            // the verdict.
            if extract::contains_ad_marker(&html) {
                return Harvest::AdContent;
            }

            let Some(text) = extract::main_text(&html) else {
                if attempt + 1 < attempts {
                    tokio::time::sleep(RETRY_BACKOFF * (attempt as u32 + 1)).await;
                }
                continue;
            };
            if text.chars().count() < extract::MIN_EXTRACT_CHARS {
                tracing::debug!(url, chars = text.chars().count(), "extracted text below floor");
                if attempt + 1 < attempts {
                    tokio::time::sleep(RETRY_BACKOFF * (attempt as u32 + 1)).await;
                }
                continue;
            }
            if extract::contains_ad_marker(&text) {
                return Harvest::AdContent;
            }

            let text = filter::strip_reasoning(&text);
            // Second, higher floor: extraction can technically succeed yet
            // leave too little substance after filtering.
            if text.chars().count() < extract::MIN_CONTENT_CHARS {
                if attempt + 1 < attempts {
                    tokio::time::sleep(RETRY_BACKOFF * (attempt as u32 + 1)).await;
                }
                continue;
            }

            if self.cfg.validate_extracted {
                self.validate_loop(&text).await;
            }

            if self.cfg.summarize_extracted {
                let summary = self
                    .expander
                    .summarize(&text, self.cfg.max_summary_chars)
                    .await;
                if !summary.is_empty() {
                    return Harvest::Text(summary);
                }
            }
            return Harvest::Text(text);
        }
        Harvest::Failed
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let mut page = self.pool.acquire().await?;
        let navigated = page.goto(url, self.cfg.timeout(), None).await;
        self.pool.release(page).await;
        navigated
    }

    /// Quality/latency knob, not a correctness gate: ask the LLM whether the
    /// text reads as a real article, pausing between negative verdicts, and
    /// accept unconditionally once the iteration budget runs out.
    async fn validate_loop(&self, text: &str) {
        let iters = self.cfg.max_iter.max(1);
        for iter in 0..iters {
            if self.expander.validate_text(text).await {
                return;
            }
            if iter + 1 < iters {
                tokio::time::sleep(VALIDATE_PAUSE).await;
            }
        }
        tracing::debug!("validation budget exhausted; accepting text as-is");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use webgather_core::{PageFactory, PageSurface, TextGenerator};

    const GOOD_ARTICLE: &str = r#"<html><body><article>
<h1>Battery safety</h1>
<p>Thermal runaway is a chain reaction inside a lithium cell. Once the cell
temperature passes a safety threshold, the electrolyte decomposes, pressure
builds, and the casing can rupture within seconds. Cooling systems and cell
spacing are the main design defenses against propagation.</p>
</article></body></html>"#;

    const SPONSORED_PAGE: &str = r#"<html><body>
<div class="label">Sponsored</div>
<article><p>Buy our miracle product today, satisfaction guaranteed for all
customers in every region of the world, limited stock available now.</p></article>
</body></html>"#;

    const THIN_PAGE: &str = "<html><body><div>too little text here</div></body></html>";

    struct FixedPage {
        html: &'static str,
        goto_errors_first: Arc<AtomicUsize>,
        error_message: &'static str,
        gotos: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl PageSurface for FixedPage {
        async fn goto(
            &mut self,
            _url: &str,
            _timeout: Duration,
            _wait_selector: Option<&str>,
        ) -> Result<String> {
            self.gotos.fetch_add(1, Ordering::SeqCst);
            if self
                .goto_errors_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(Error::Navigate(self.error_message.to_string()));
            }
            Ok(self.html.to_string())
        }

        async fn reset(&mut self) -> Result<()> {
            Ok(())
        }

        async fn close(&mut self) {}
    }

    struct FixedFactory {
        html: &'static str,
        goto_errors_first: Arc<AtomicUsize>,
        error_message: &'static str,
        gotos: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl PageFactory for FixedFactory {
        async fn open_page(&self) -> Result<Box<dyn PageSurface>> {
            Ok(Box::new(FixedPage {
                html: self.html,
                goto_errors_first: self.goto_errors_first.clone(),
                error_message: self.error_message,
                gotos: self.gotos.clone(),
            }))
        }
    }

    fn harvester_for(
        html: &'static str,
        failures: usize,
        error_message: &'static str,
        cfg: PipelineConfig,
    ) -> (Harvester, Arc<AtomicUsize>) {
        let gotos = Arc::new(AtomicUsize::new(0));
        let factory = Arc::new(FixedFactory {
            html,
            goto_errors_first: Arc::new(AtomicUsize::new(failures)),
            error_message,
            gotos: gotos.clone(),
        });
        let pool = Arc::new(PagePool::new(factory, &cfg));
        (
            Harvester::new(pool, Expander::offline(), cfg),
            gotos,
        )
    }

    fn fast_cfg() -> PipelineConfig {
        PipelineConfig {
            acquire_poll_ms: 1,
            acquire_retries: 2,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn extracts_article_text() {
        let (h, _) = harvester_for(GOOD_ARTICLE, 0, "", fast_cfg());
        match h.extract("https://example.com/article").await {
            Harvest::Text(text) => {
                assert!(text.contains("chain reaction"));
                assert!(text.chars().count() >= extract::MIN_CONTENT_CHARS);
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn extraction_is_idempotent_for_static_content() {
        let (h, _) = harvester_for(GOOD_ARTICLE, 0, "", fast_cfg());
        let a = h.extract("https://example.com/article").await;
        let b = h.extract("https://example.com/article").await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn sponsored_markup_is_rejected_without_retry() {
        let (h, gotos) = harvester_for(SPONSORED_PAGE, 0, "", fast_cfg());
        assert_eq!(h.extract("https://example.com/ad").await, Harvest::AdContent);
        assert_eq!(gotos.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn thin_content_fails_after_budget() {
        let cfg = PipelineConfig {
            max_retry: 2,
            ..fast_cfg()
        };
        let (h, gotos) = harvester_for(THIN_PAGE, 0, "", cfg);
        // Backoff between attempts is real time; keep the budget small.
        assert_eq!(h.extract("https://example.com/thin").await, Harvest::Failed);
        assert_eq!(gotos.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn navigation_failures_are_retried_then_succeed() {
        let cfg = PipelineConfig {
            max_retry: 3,
            ..fast_cfg()
        };
        let (h, _) = harvester_for(
            GOOD_ARTICLE,
            1,
            "net::ERR_TIMED_OUT at https://example.com",
            cfg,
        );
        assert!(matches!(
            h.extract("https://example.com/article").await,
            Harvest::Text(_)
        ));
    }

    #[tokio::test]
    async fn interrupted_navigation_retries_without_consuming_backoff() {
        let cfg = PipelineConfig {
            max_retry: 3,
            ..fast_cfg()
        };
        let (h, gotos) = harvester_for(
            GOOD_ARTICLE,
            2,
            "navigation to page was interrupted by another navigation",
            cfg,
        );
        let started = std::time::Instant::now();
        assert!(matches!(
            h.extract("https://example.com/article").await,
            Harvest::Text(_)
        ));
        // Two interrupted attempts + one success, with no 1s backoffs.
        assert_eq!(gotos.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn validation_accepts_on_final_iteration_with_negative_verdicts() {
        struct AlwaysFalse;
        #[async_trait::async_trait]
        impl TextGenerator for AlwaysFalse {
            async fn generate(&self, _prompt: &str, _max_tokens: u64) -> Result<String> {
                Ok("False".to_string())
            }
        }

        let cfg = PipelineConfig {
            validate_extracted: true,
            max_iter: 2,
            ..fast_cfg()
        };
        let gotos = Arc::new(AtomicUsize::new(0));
        let factory = Arc::new(FixedFactory {
            html: GOOD_ARTICLE,
            goto_errors_first: Arc::new(AtomicUsize::new(0)),
            error_message: "",
            gotos,
        });
        let pool = Arc::new(PagePool::new(factory, &cfg));
        let h = Harvester::new(pool, Expander::new(Arc::new(AlwaysFalse)), cfg);

        // Verdict is negative on every iteration; the final one accepts.
        assert!(matches!(
            h.extract("https://example.com/article").await,
            Harvest::Text(_)
        ));
    }

    #[tokio::test]
    async fn summarization_replaces_content_when_enabled() {
        struct Summarizer;
        #[async_trait::async_trait]
        impl TextGenerator for Summarizer {
            async fn generate(&self, _prompt: &str, _max_tokens: u64) -> Result<String> {
                Ok("Cells overheat and burn.".to_string())
            }
        }

        let cfg = PipelineConfig {
            summarize_extracted: true,
            ..fast_cfg()
        };
        let gotos = Arc::new(AtomicUsize::new(0));
        let factory = Arc::new(FixedFactory {
            html: GOOD_ARTICLE,
            goto_errors_first: Arc::new(AtomicUsize::new(0)),
            error_message: "",
            gotos,
        });
        let pool = Arc::new(PagePool::new(factory, &cfg));
        let h = Harvester::new(pool, Expander::new(Arc::new(Summarizer)), cfg);

        assert_eq!(
            h.extract("https://example.com/article").await,
            Harvest::Text("Cells overheat and burn.".to_string())
        );
    }
}
