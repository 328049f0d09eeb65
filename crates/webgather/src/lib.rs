//! Public facade for the webgather pipeline.
//!
//! Re-exports the backend-agnostic types (`webgather-core`) and the local
//! implementations (`webgather-local`). Typical use:
//!
//! ```no_run
//! use webgather::{build_orchestrator, PipelineConfig};
//!
//! # async fn run() {
//! let cfg = PipelineConfig::default();
//! let orch = build_orchestrator(webgather::reqwest::Client::new(), None, cfg);
//! let results = orch.search_one("lithium battery fires", 5).await;
//! for r in results {
//!     println!("{} {}", r.link, r.title);
//! }
//! # }
//! ```

pub use webgather_core::*;

pub use webgather_local::build_orchestrator;
pub use webgather_local::reqwest;
pub use webgather_local::channels;
pub use webgather_local::extract;
pub use webgather_local::filter;
pub use webgather_local::harvest;
pub use webgather_local::llm;
pub use webgather_local::orchestrate;
pub use webgather_local::playwright;
pub use webgather_local::pool;
pub use webgather_local::serp;
