use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use webgather_core::{PipelineConfig, TextGenerator};
use webgather_local::llm::OpenAiCompatGenerator;
use webgather_local::playwright;

#[derive(Parser, Debug)]
#[command(name = "webgather")]
#[command(about = "Search the web and hand back clean text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search one keyword and print hydrated results (json).
    Search(SearchCmd),
    /// Expand a natural-language description into keywords, search them all,
    /// and print the merged results (json).
    Expand(ExpandCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug, Clone)]
struct PipelineArgs {
    /// Search engine base URL; queries go to `{base}/search?q=...`.
    #[arg(long, env = "WEBGATHER_ENGINE_URL", default_value = "https://www.bing.com")]
    engine_url: String,
    /// Per navigation/HTTP call timeout in milliseconds.
    #[arg(long, env = "WEBGATHER_TIMEOUT_MS", default_value_t = 30_000)]
    timeout_ms: u64,
    /// Retry ceiling per stage (channel attempt, extraction attempt).
    #[arg(long, env = "WEBGATHER_MAX_RETRY", default_value_t = 3)]
    max_retry: usize,
    /// LLM validation iteration ceiling.
    #[arg(long, env = "WEBGATHER_MAX_ITER", default_value_t = 3)]
    max_iter: usize,
    /// Concurrent browser page cap.
    #[arg(long, env = "WEBGATHER_MAX_PAGES", default_value_t = 4)]
    max_pages: usize,
    /// Run the browser headless.
    #[arg(long, env = "WEBGATHER_HEADLESS", action = clap::ArgAction::Set, default_value_t = true)]
    headless: bool,
    /// Skip the browser channel entirely (direct HTTP only, no hydration).
    #[arg(long, default_value_t = false)]
    no_browser: bool,
    /// Keep candidates without fetching their page content.
    #[arg(long, default_value_t = false)]
    no_hydrate: bool,
    /// LLM-validate extracted text before accepting it.
    #[arg(long, default_value_t = false)]
    validate: bool,
    /// Summarize extracted text with the LLM.
    #[arg(long, default_value_t = false)]
    summarize: bool,
    /// OpenAI-compatible LLM base URL (e.g. an Ollama endpoint). Optional;
    /// without it keyword expansion uses the deterministic fallback.
    #[arg(long, env = "WEBGATHER_LLM_BASE_URL")]
    llm_base_url: Option<String>,
    /// Model name for the LLM endpoint.
    #[arg(long, env = "WEBGATHER_LLM_MODEL", default_value = "qwen2.5:3b-instruct")]
    llm_model: String,
    /// Bearer key for the LLM endpoint, when it wants one.
    #[arg(long, env = "WEBGATHER_LLM_API_KEY")]
    llm_api_key: Option<String>,
}

impl PipelineArgs {
    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            engine_base_url: self.engine_url.clone(),
            timeout_ms: self.timeout_ms,
            max_retry: self.max_retry,
            max_iter: self.max_iter,
            max_pages: self.max_pages,
            headless: self.headless,
            hydrate: !self.no_hydrate,
            validate_extracted: self.validate,
            summarize_extracted: self.summarize,
            ..PipelineConfig::default()
        }
    }

    fn generator(&self, client: reqwest::Client) -> Option<Arc<dyn TextGenerator>> {
        let base_url = self.llm_base_url.clone()?;
        match OpenAiCompatGenerator::new(
            client,
            base_url,
            self.llm_api_key.clone(),
            self.llm_model.clone(),
            self.timeout_ms,
        ) {
            Ok(g) => Some(Arc::new(g)),
            Err(e) => {
                tracing::warn!(error = %e, "llm not usable; continuing with fallbacks");
                None
            }
        }
    }

    fn orchestrator(&self) -> webgather_local::orchestrate::Orchestrator {
        if self.no_browser {
            // The wiring layer reads the same escape hatch the tests use.
            std::env::set_var("WEBGATHER_BROWSER_DISABLE", "1");
        }
        let client = reqwest::Client::new();
        let generator = self.generator(client.clone());
        webgather_local::build_orchestrator(client, generator, self.config())
    }
}

#[derive(clap::Args, Debug)]
struct SearchCmd {
    /// Search keyword(s).
    #[arg(long)]
    query: String,
    /// Result-set width.
    #[arg(long, default_value_t = 5)]
    top_k: usize,
    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(clap::Args, Debug)]
struct ExpandCmd {
    /// Natural-language description of what to find.
    #[arg(long)]
    description: String,
    /// How many keyword rewrites to fan out over.
    #[arg(long, default_value_t = 5)]
    rewrites: usize,
    /// Result-set width after the merge.
    #[arg(long, default_value_t = 5)]
    top_k: usize,
    #[command(flatten)]
    pipeline: PipelineArgs,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn doctor_json() -> serde_json::Value {
    let node = std::process::Command::new(playwright::node_bin())
        .arg("--version")
        .output();
    let (node_present, node_version) = match node {
        Ok(o) if o.status.success() => (
            true,
            Some(String::from_utf8_lossy(&o.stdout).trim().to_string()),
        ),
        _ => (false, None),
    };

    serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "browser": {
            "disabled": playwright::browser_disabled(),
            "node_present": node_present,
            "node_version": node_version,
            "hint": if node_present {
                "install the playwright npm package and run `npx playwright install chromium` if browser searches fail"
            } else {
                "install Node.js (or set WEBGATHER_NODE) to enable the browser channel"
            },
        },
        "llm": {
            "configured": std::env::var("WEBGATHER_LLM_BASE_URL").map(|v| !v.trim().is_empty()).unwrap_or(false),
        },
        "engine_url": std::env::var("WEBGATHER_ENGINE_URL")
            .unwrap_or_else(|_| "https://www.bing.com".to_string()),
    })
}

fn version_json() -> serde_json::Value {
    serde_json::json!({
        "schema_version": 1,
        "kind": "version",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(cmd) => {
            let orch = cmd.pipeline.orchestrator();
            let results = orch.search_one(&cmd.query, cmd.top_k).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Expand(cmd) => {
            let orch = cmd.pipeline.orchestrator();
            let results = orch
                .search_expanded(&cmd.description, cmd.rewrites, cmd.top_k)
                .await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Doctor => {
            println!("{}", serde_json::to_string_pretty(&doctor_json())?);
        }
        Commands::Version => {
            println!("{}", serde_json::to_string_pretty(&version_json())?);
        }
    }
    Ok(())
}
