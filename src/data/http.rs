use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Bounded-retry JSON fetch capability the data clients depend on. Tests
/// substitute deterministic fixtures instead of real network calls.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value>;
}

/// Production fetcher: fixed retry count, fixed backoff delay, hard request
/// timeout. Timeouts apply to network calls only.
pub struct RetryingFetcher {
    client: Client,
    retries: u32,
    retry_delay: Duration,
}

impl RetryingFetcher {
    pub fn new(retries: u32, retry_delay: Duration, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, retries, retry_delay })
    }
}

#[async_trait]
impl JsonFetcher for RetryingFetcher {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.client.get(url).header("Accept", "application/json").send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        last_err = Some(anyhow!("HTTP {} from {}", status, url));
                        continue;
                    }
                    match resp.json::<serde_json::Value>().await {
                        Ok(value) => return Ok(value),
                        Err(e) => {
                            last_err = Some(anyhow!(e).context(format!("bad JSON from {}", url)));
                        }
                    }
                }
                Err(e) => {
                    last_err = Some(anyhow!(e).context(format!("request to {} failed", url)));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("request to {} failed", url)))
    }
}
