//! Channel fallback, candidate hydration, and the keyword-expansion
//! fan-out/merge.

use crate::harvest::{Harvest, Harvester};
use crate::llm::Expander;
use futures_util::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use webgather_core::{normalize_link, Candidate, PipelineConfig, SearchChannel, SearchResult};

/// Per-keyword fetch width inside the fan-out; wider than the final result
/// set so the merge has diversity to dedup across.
const EXPANDED_PER_KEYWORD: usize = 10;

pub struct Orchestrator {
    channels: Vec<Arc<dyn SearchChannel>>,
    harvester: Arc<Harvester>,
    expander: Expander,
    cfg: PipelineConfig,
}

impl Orchestrator {
    /// Channels are tried in the order given; pass the browser channel
    /// first and the HTTP channel second for the production chain.
    pub fn new(
        channels: Vec<Arc<dyn SearchChannel>>,
        harvester: Arc<Harvester>,
        expander: Expander,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            channels,
            harvester,
            expander,
            cfg,
        }
    }

    /// Run the channel chain for one keyword until a channel yields
    /// candidates. Channel errors and empty results both fall through; a
    /// full miss is an empty list, never an error.
    async fn candidates_for(&self, keyword: &str, top_k: usize) -> Vec<Candidate> {
        for channel in &self.channels {
            match channel.search(keyword, top_k).await {
                Ok(candidates) if !candidates.is_empty() => {
                    tracing::debug!(
                        keyword,
                        channel = channel.name(),
                        count = candidates.len(),
                        "channel produced candidates"
                    );
                    return candidates;
                }
                Ok(_) => {
                    tracing::debug!(keyword, channel = channel.name(), "channel came up empty");
                }
                Err(e) => {
                    tracing::warn!(keyword, channel = channel.name(), error = %e, "channel failed");
                }
            }
        }
        Vec::new()
    }

    /// Search one keyword and hydrate the candidates.
    ///
    /// Results keep candidate (page) order, carry pairwise-distinct links,
    /// and never exceed `top_k`. Candidates whose extraction reports ad
    /// content or failure are dropped; with hydration disabled every
    /// candidate is kept with empty content.
    pub async fn search_one(&self, keyword: &str, top_k: usize) -> Vec<SearchResult> {
        let mut candidates = self.candidates_for(keyword, top_k).await;

        // Dedup within the keyword before spending page budget on fetches.
        let mut seen: HashSet<String> = HashSet::new();
        candidates.retain(|c| seen.insert(normalize_link(&c.link)));
        candidates.truncate(top_k);

        if !self.cfg.hydrate {
            return candidates
                .into_iter()
                .map(SearchResult::from_candidate)
                .collect();
        }

        // Bounded parallel hydration sized to the page pool; `buffered`
        // keeps completion order aligned with candidate order.
        let harvester = self.harvester.clone();
        let hydrated: Vec<(Candidate, Harvest)> = futures_util::stream::iter(candidates)
            .map(|candidate| {
                let harvester = harvester.clone();
                async move {
                    let harvest = harvester.extract(&candidate.link).await;
                    (candidate, harvest)
                }
            })
            .buffered(self.cfg.max_pages.max(1))
            .collect()
            .await;

        let mut out = Vec::new();
        for (candidate, harvest) in hydrated {
            match harvest {
                Harvest::Text(content) => {
                    let mut result = SearchResult::from_candidate(candidate);
                    result.content = content;
                    out.push(result);
                }
                Harvest::AdContent => {
                    tracing::debug!(link = %candidate.link, "dropping ad-content candidate");
                }
                Harvest::Failed => {
                    tracing::debug!(link = %candidate.link, "dropping failed extraction");
                }
            }
        }
        out
    }

    /// Expand a natural-language description into keywords and merge their
    /// searches.
    ///
    /// Keywords are processed in order and each one's failure is isolated,
    /// so the merge is deterministic given deterministic channels: first
    /// seen link wins, later duplicates are dropped, and the merged list is
    /// truncated to `top_k`.
    pub async fn search_expanded(
        &self,
        description: &str,
        rewrite_count: usize,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let keywords = self.expander.rewrite_keywords(description, rewrite_count).await;
        tracing::debug!(?keywords, "expanded description into keywords");

        let mut merged: Vec<SearchResult> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for keyword in &keywords {
            let results = self.search_one(keyword, EXPANDED_PER_KEYWORD).await;
            for result in results {
                if seen.insert(normalize_link(&result.link)) {
                    merged.push(result);
                }
            }
        }
        merged.truncate(top_k);
        merged
    }
}
