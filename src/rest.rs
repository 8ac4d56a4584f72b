//! REST snapshot source
//!
//! Fetches the full-depth snapshot the replica is seeded from.

use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::error::{BookError, Result};
use crate::parser::DepthSnapshot;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can produce a depth snapshot for a symbol
pub trait SnapshotSource: Send + Sync {
    fn fetch(
        &self,
        symbol: &str,
        depth: usize,
    ) -> impl Future<Output = Result<DepthSnapshot>> + Send;
}

/// Binance `GET /depth` client
#[derive(Debug, Clone)]
pub struct RestSnapshotClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RestSnapshotClient {
    /// Create a client for a REST base URL such as `https://api.binance.com/api/v3`
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl SnapshotSource for RestSnapshotClient {
    async fn fetch(&self, symbol: &str, depth: usize) -> Result<DepthSnapshot> {
        let url = format!("{}/depth", self.endpoint);
        info!(symbol = %symbol, url = %url, limit = depth, "Fetching order book snapshot");

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.to_string()), ("limit", depth.to_string())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BookError::SnapshotUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        DepthSnapshot::parse(&body)
    }
}
