use std::time::Duration;

use crate::error::RunError;
use crate::{ToolDefinition, ToolParam};

use super::{ProjectTool, ToolCtx, require_str_list};

/// Per-fetch wall-clock bound.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Cap response body to avoid blowing up context.
const MAX_BYTES: usize = 100_000;

/// Contract for external content fetches. Failures are per-URL strings so a
/// bad URL never aborts the batch.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, String>;
}

/// reqwest-backed fetcher with a hard timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read body: {e}"))?;
        let mut text = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_BYTES)]).to_string();
        if bytes.len() > MAX_BYTES {
            text.push_str("\n[truncated]");
        }
        Ok(text)
    }
}

/// Fetch external web content the user referenced.
pub struct ScrapeUrls;

#[async_trait::async_trait]
impl ProjectTool for ScrapeUrls {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "scrapeUrls".into(),
            description: "Fetch the text content of external URLs the user referenced".into(),
            params: vec![ToolParam::typed("urls", "array").describe("Array of URLs to fetch")],
        }
    }

    async fn call(&self, args: &serde_json::Value, ctx: &ToolCtx<'_>) -> Result<String, RunError> {
        let urls = match require_str_list(args, "urls") {
            Ok(urls) => urls,
            Err(report) => return Ok(report),
        };

        ctx.step
            .run(&ctx.step_name("scrapeUrls"), || async {
                let mut sections: Vec<String> = Vec::with_capacity(urls.len());
                for url in &urls {
                    let section = match ctx.env.fetcher.fetch(url).await {
                        Ok(content) => format!("## {url}\n{content}"),
                        Err(failure) => format!("## {url}\nError: {failure}"),
                    };
                    sections.push(section);
                }
                Ok(sections.join("\n\n"))
            })
            .await
    }
}
