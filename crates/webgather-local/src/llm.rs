//! Text-generation client and the keyword-expansion helpers built on it.
//!
//! The generator is a thin OpenAI-compatible chat client (Ollama and
//! similar local servers speak this surface). Everything layered on top
//! degrades deterministically when the service is down: expansion pads from
//! the description, validation answers false, summaries truncate.

use crate::filter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use webgather_core::{Error, Result, TextGenerator};

#[derive(Debug, Clone)]
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_ms: u64,
}

impl OpenAiCompatGenerator {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
        model: String,
        timeout_ms: u64,
    ) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(Error::NotConfigured("missing llm base url".to_string()));
        }
        if model.trim().is_empty() {
            return Err(Error::NotConfigured("missing llm model".to_string()));
        }
        Ok(Self {
            client,
            base_url,
            api_key,
            model,
            timeout_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl TextGenerator for OpenAiCompatGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u64) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: Some(max_tokens),
            temperature: Some(0.7),
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("chat.completions HTTP {status}")));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Keyword entries longer than this are discarded; padded entries stay
/// under it by construction.
pub const MAX_KEYWORD_CHARS: usize = 20;

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Strip list numbering/bullet prefixes from one generated line.
fn strip_list_prefix(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c.is_ascii_digit() || c == '.' || c == '-' || c == '*' || c == ')' || c.is_whitespace()
    })
}

/// Keyword expansion, validation, and summarization over a generator.
///
/// Every method is total: a failing or under-producing generator degrades
/// to a deterministic local fallback, never an error.
#[derive(Clone)]
pub struct Expander {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Expander {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// An expander with no generation service; all methods use their
    /// deterministic fallbacks.
    pub fn offline() -> Self {
        Self { generator: None }
    }

    async fn generate(&self, prompt: &str, max_tokens: u64) -> String {
        let Some(g) = &self.generator else {
            return String::new();
        };
        match g.generate(prompt, max_tokens).await {
            Ok(text) => filter::strip_reasoning(&text),
            Err(e) => {
                tracing::warn!(error = %e, "text generation failed; using fallback");
                String::new()
            }
        }
    }

    /// Rewrite a natural-language description into exactly `count` short
    /// search keywords, each at most [`MAX_KEYWORD_CHARS`] characters.
    ///
    /// Under-production (service down, malformed output, duplicates) is
    /// padded deterministically from truncated description fragments plus a
    /// distinguishing index.
    pub async fn rewrite_keywords(&self, description: &str, count: usize) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }
        let prompt = format!(
            "Rewrite the following request into {count} short search-engine keywords, \
             one per line, each at most {MAX_KEYWORD_CHARS} characters, with no explanations.\n\
             Request: {description}"
        );
        let response = self.generate(&prompt, 300).await;

        let mut keywords: Vec<String> = Vec::new();
        for line in response.lines() {
            let kw = strip_list_prefix(line.trim()).trim();
            if kw.is_empty() || kw.chars().count() > MAX_KEYWORD_CHARS {
                continue;
            }
            if keywords.iter().any(|k| k == kw) {
                continue;
            }
            keywords.push(kw.to_string());
            if keywords.len() >= count {
                break;
            }
        }

        // Deterministic padding: truncated description fragment + index.
        let stem = truncate_chars(description.trim(), 15);
        let mut i = 1usize;
        while keywords.len() < count {
            let fallback = format!("{stem} {i}");
            if !keywords.iter().any(|k| k == &fallback) {
                keywords.push(fallback);
            }
            i += 1;
        }
        keywords.truncate(count);
        keywords
    }

    /// Yes/no coherence check on extracted text ("real article body, not a
    /// login wall or garbage"). Any generation failure answers `false`.
    pub async fn validate_text(&self, text: &str) -> bool {
        if text.chars().count() < 50 {
            return false;
        }
        let sample = truncate_chars(text, 1000);
        let prompt = format!(
            "The following text was extracted from a web page. Answer only True or False: \
             is it coherent article body text (not garbled output, a login wall, or an ad)?\n\
             Text: {sample}"
        );
        let response = self.generate(&prompt, 10).await;
        response.to_ascii_lowercase().contains("true")
    }

    /// Summarize `text` to at most `max_chars` characters. Falls back to
    /// plain truncation of the input when generation fails or returns
    /// nothing.
    pub async fn summarize(&self, text: &str, max_chars: usize) -> String {
        if text.is_empty() {
            return String::new();
        }
        let prompt = format!(
            "Summarize the following content in at most {max_chars} characters:\n{text}"
        );
        let response = self.generate(&prompt, 200).await;
        if response.is_empty() {
            truncate_chars(text, max_chars).trim().to_string()
        } else {
            truncate_chars(&response, max_chars).trim().to_string()
        }
    }
}
