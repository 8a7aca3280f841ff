//! Poll-channel fallback: plain HTTP requests against the dashboard API.
//!
//! Failures here are never fatal; the caller logs and keeps the last known
//! registry state rather than blanking the view.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{parse_list, parse_stats_batch, PollEnvelope, ServerMeta, StatsPatch};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

pub struct PollClient {
    base: String,
    client: reqwest::Client,
}

impl PollClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, PollError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// `GET /servers` normalized to list items.
    pub async fn fetch_servers(&self) -> Result<Vec<ServerMeta>, PollError> {
        let body = self.get(&format!("{}/servers", self.base)).await?;
        Ok(parse_list(&body.servers))
    }

    /// `GET /stats?include_disabled=false` normalized to stat patches.
    pub async fn fetch_stats(&self) -> Result<Vec<(String, StatsPatch)>, PollError> {
        let body = self
            .get(&format!("{}/stats?include_disabled=false", self.base))
            .await?;
        Ok(parse_stats_batch(&body.servers))
    }

    async fn get(&self, url: &str) -> Result<PollEnvelope, PollError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(PollError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }
}
