//! HTTP readiness probe.

use std::time::Duration;

use async_trait::async_trait;

use crate::runtime::HealthProbe;

/// Ready when a GET on the Neo4j HTTP endpoint returns a success status.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn is_ready(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::trace!(url = %self.url, error = %e, "Probe not ready");
                false
            }
        }
    }
}
