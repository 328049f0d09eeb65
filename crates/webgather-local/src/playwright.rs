//! Playwright-backed page surfaces.
//!
//! Each [`PageSurface`] is one long-lived Node child process driving a
//! single Chromium page through the Playwright npm package. Commands and
//! replies travel as newline-delimited JSON over stdin/stdout; stdout is
//! JSON-only so replies parse deterministically.
//!
//! Expected setup (never auto-installed at runtime — slow, non-deterministic,
//! and surprising in offline environments):
//! - Node.js present
//! - `playwright` npm package available to Node (global, or via NODE_PATH)
//! - browsers installed (e.g. `npx playwright install chromium`)

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use webgather_core::{Error, PageFactory, PageSurface, Result};

fn env_truthy(k: &str) -> bool {
    matches!(
        std::env::var(k)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Deterministic escape hatch (tests and "no local tooling" environments).
pub fn browser_disabled() -> bool {
    env_truthy("WEBGATHER_BROWSER_DISABLE")
}

fn node_path_candidates() -> Vec<String> {
    // Best-effort Node global module roots across common setups. Explicit
    // overrides: NODE_PATH or WEBGATHER_NODE_PATH.
    let mut out: Vec<String> = Vec::new();

    if let Some(home) = std::env::var_os("HOME").map(std::path::PathBuf::from) {
        out.push(
            home.join(".npm-global")
                .join("lib")
                .join("node_modules")
                .to_string_lossy()
                .to_string(),
        );
    }
    out.push("/opt/homebrew/lib/node_modules".to_string());
    out.push("/usr/local/lib/node_modules".to_string());
    out.push("/usr/lib/node_modules".to_string());
    out
}

pub(crate) fn detect_node_path_for_playwright() -> Option<String> {
    fn node_path_has_playwright(np: &str) -> bool {
        np.split(':')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .any(|p| std::path::PathBuf::from(p).join("playwright").is_dir())
    }

    if let Ok(v) = std::env::var("WEBGATHER_NODE_PATH") {
        let v = v.trim();
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }

    let existing = std::env::var("NODE_PATH").ok().unwrap_or_default();
    if node_path_has_playwright(&existing) {
        return None;
    }

    let found = node_path_candidates().into_iter().find(|root| {
        !root.trim().is_empty()
            && std::path::PathBuf::from(root.trim())
                .join("playwright")
                .is_dir()
    })?;

    if existing.trim().is_empty() {
        Some(found)
    } else {
        Some(format!("{existing}:{found}"))
    }
}

/// Node binary to use (`WEBGATHER_NODE` override, else PATH lookup).
pub fn node_bin() -> String {
    std::env::var("WEBGATHER_NODE").unwrap_or_else(|_| "node".to_string())
}

// One page per process keeps ownership trivial: the Rust side's exclusive
// &mut access is mirrored by an exclusive child. The command loop is
// strictly request/reply, so one reply line per command.
const JS: &str = r#"
const readline = require('readline');

function out(obj) { process.stdout.write(JSON.stringify(obj) + '\n'); }

async function main() {
  let pw;
  try { pw = require('playwright'); } catch (e) {
    out({ ok: false, error: { code: 'not_configured',
      message: 'Playwright is not installed for Node.js (require("playwright") failed)' } });
    process.exit(1);
  }

  const headless = process.argv[2] !== 'headed';
  let browser, context, page;
  try {
    browser = await pw.chromium.launch({ headless });
    context = await browser.newContext({ serviceWorkers: 'block' });
    page = await context.newPage();
  } catch (e) {
    out({ ok: false, error: { code: 'launch_failed', message: String(e && e.message ? e.message : e) } });
    process.exit(1);
  }

  out({ ok: true, ready: true });

  const rl = readline.createInterface({ input: process.stdin, terminal: false });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try { req = JSON.parse(line); } catch (e) {
      out({ ok: false, error: { code: 'invalid_params', message: 'bad JSON command' } });
      continue;
    }
    const op = String(req.op || '');
    try {
      if (op === 'goto') {
        const timeoutMs = Number(req.timeout_ms || 30000);
        const resp = await page.goto(String(req.url || ''), { waitUntil: 'load', timeout: timeoutMs });
        if (req.wait_selector) {
          await page.waitForSelector(String(req.wait_selector), { timeout: timeoutMs });
        }
        const html = await page.content();
        out({ ok: true, html, final_url: page.url(), status: resp ? resp.status() : null });
      } else if (op === 'reset') {
        await page.goto('about:blank', { timeout: 5000 });
        out({ ok: true });
      } else if (op === 'close') {
        out({ ok: true });
        try { await browser.close(); } catch (_) {}
        process.exit(0);
      } else {
        out({ ok: false, error: { code: 'invalid_params', message: 'unknown op ' + op } });
      }
    } catch (e) {
      out({ ok: false, error: { code: 'navigate_failed', message: String(e && e.message ? e.message : e) } });
    }
  }
  try { await browser.close(); } catch (_) {}
}

main().catch((e) => {
  out({ ok: false, error: { code: 'launch_failed', message: String(e && e.message ? e.message : e) } });
  process.exit(1);
});
"#;

pub struct PlaywrightPage {
    child: tokio::process::Child,
    stdin: tokio::process::ChildStdin,
    stdout: tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
}

impl PlaywrightPage {
    async fn spawn(headless: bool, ready_timeout: Duration) -> Result<Self> {
        if browser_disabled() {
            return Err(Error::NotConfigured(
                "browser channel disabled (WEBGATHER_BROWSER_DISABLE)".to_string(),
            ));
        }

        let mut cmd = tokio::process::Command::new(node_bin());
        if let Some(node_path) = detect_node_path_for_playwright() {
            cmd.env("NODE_PATH", node_path);
        }
        let mut child = cmd
            .arg("-e")
            .arg(JS)
            .arg(if headless { "headless" } else { "headed" })
            .kill_on_drop(true)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::NotConfigured(format!(
                    "browser pages require Node.js (`node`) and the Playwright npm package: {e}"
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Navigate("page process: missing stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Navigate("page process: missing stdout pipe".to_string()))?;

        let mut page = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        // The first line is the ready/launch-failure report.
        let ready = page.read_reply(ready_timeout).await?;
        if ready.get("ready").and_then(|v| v.as_bool()) != Some(true) {
            page.close().await;
            return Err(Error::Navigate("page process: unexpected ready reply".to_string()));
        }
        Ok(page)
    }

    async fn send(&mut self, cmd: &serde_json::Value) -> Result<()> {
        let mut line = cmd.to_string();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Navigate(format!("page process write failed: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| Error::Navigate(format!("page process flush failed: {e}")))
    }

    async fn read_reply(&mut self, timeout: Duration) -> Result<serde_json::Value> {
        // Hard wall-clock bound: a hung child must not hang the pipeline.
        let line = match tokio::time::timeout(timeout, self.stdout.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                return Err(Error::Navigate("page process exited".to_string()));
            }
            Ok(Err(e)) => {
                return Err(Error::Navigate(format!("page process read failed: {e}")));
            }
            Err(_) => {
                let _ = self.child.start_kill();
                return Err(Error::Navigate(format!(
                    "page process reply timeout after {}ms",
                    timeout.as_millis()
                )));
            }
        };

        let v: serde_json::Value = serde_json::from_str(line.trim())
            .map_err(|e| Error::Navigate(format!("page process returned invalid JSON: {e}")))?;

        if v.get("ok").and_then(|x| x.as_bool()) == Some(true) {
            return Ok(v);
        }
        let code = v
            .pointer("/error/code")
            .and_then(|x| x.as_str())
            .unwrap_or("navigate_failed");
        let message = v
            .pointer("/error/message")
            .and_then(|x| x.as_str())
            .unwrap_or("page operation failed");
        Err(match code {
            "not_configured" => Error::NotConfigured(message.to_string()),
            "invalid_params" => Error::InvalidUrl(message.to_string()),
            _ => Error::Navigate(message.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl PageSurface for PlaywrightPage {
    async fn goto(
        &mut self,
        url: &str,
        timeout: Duration,
        wait_selector: Option<&str>,
    ) -> Result<String> {
        let cmd = serde_json::json!({
            "op": "goto",
            "url": url,
            "timeout_ms": timeout.as_millis() as u64,
            "wait_selector": wait_selector,
        });
        self.send(&cmd).await?;
        // Grace on top of the in-page timeout so Playwright's own timeout
        // error reaches us before the hard kill.
        let reply = self
            .read_reply(timeout.saturating_add(Duration::from_secs(10)))
            .await?;
        let html = reply
            .get("html")
            .and_then(|x| x.as_str())
            .unwrap_or("")
            .to_string();
        // An empty document would otherwise look like a successful load.
        if html.trim().is_empty() {
            return Err(Error::Navigate("page returned empty HTML".to_string()));
        }
        Ok(html)
    }

    async fn reset(&mut self) -> Result<()> {
        self.send(&serde_json::json!({ "op": "reset" })).await?;
        self.read_reply(Duration::from_secs(10)).await.map(|_| ())
    }

    async fn close(&mut self) {
        let _ = self.send(&serde_json::json!({ "op": "close" })).await;
        let _ = tokio::time::timeout(Duration::from_secs(2), self.child.wait()).await;
        let _ = self.child.start_kill();
    }
}

/// Creates one Playwright page process per pool slot.
#[derive(Debug, Clone)]
pub struct PlaywrightFactory {
    headless: bool,
    ready_timeout: Duration,
}

impl PlaywrightFactory {
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            ready_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait::async_trait]
impl PageFactory for PlaywrightFactory {
    async fn open_page(&self) -> Result<Box<dyn PageSurface>> {
        let page = PlaywrightPage::spawn(self.headless, self.ready_timeout).await?;
        Ok(Box::new(page))
    }
}
