//! Local implementations of the webgather pipeline: a Playwright-backed
//! browser channel fed by a bounded page pool, a direct reqwest channel, a
//! per-URL extraction engine, and the keyword fan-out orchestrator.
//!
//! Everything is injected through the `webgather-core` traits, so each piece
//! swaps for a test double without touching the pipeline.

pub use reqwest;

pub mod channels;
pub mod extract;
pub mod filter;
pub mod harvest;
pub mod llm;
pub mod orchestrate;
pub mod playwright;
pub mod pool;
pub mod serp;

use std::sync::Arc;
use webgather_core::{PipelineConfig, SearchChannel, TextGenerator};

/// Wire the production pipeline: Playwright browser channel (unless
/// disabled), HTTP fallback channel, shared pool, and harvester.
///
/// `generator` is the optional text-generation capability; without it the
/// expansion/validation/summarization paths run on their deterministic
/// fallbacks.
pub fn build_orchestrator(
    client: reqwest::Client,
    generator: Option<Arc<dyn TextGenerator>>,
    cfg: PipelineConfig,
) -> orchestrate::Orchestrator {
    let mut cfg = cfg;
    if playwright::browser_disabled() {
        // No page surfaces without a browser; keep candidates unhydrated
        // instead of burning the retry budget on pool failures.
        cfg.hydrate = false;
    }

    let factory = Arc::new(playwright::PlaywrightFactory::new(cfg.headless));
    let pool = Arc::new(pool::PagePool::new(factory, &cfg));

    let mut channel_chain: Vec<Arc<dyn SearchChannel>> = Vec::new();
    if !playwright::browser_disabled() {
        channel_chain.push(Arc::new(channels::BrowserChannel::new(
            pool.clone(),
            cfg.clone(),
        )));
    }
    channel_chain.push(Arc::new(channels::HttpChannel::new(client, cfg.clone())));

    let expander = match generator {
        Some(g) => llm::Expander::new(g),
        None => llm::Expander::offline(),
    };
    let harvester = Arc::new(harvest::Harvester::new(pool, expander.clone(), cfg.clone()));
    orchestrate::Orchestrator::new(channel_chain, harvester, expander, cfg)
}
