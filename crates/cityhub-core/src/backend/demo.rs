use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, CompletionBackend};
use crate::error::BackendError;
use crate::provider::Provider;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoRequest {
    title: &'static str,
    user_id: u32,
}

#[derive(Deserialize)]
struct DemoResponse {
    title: Option<String>,
}

/// Latency test against a public echo API. The prompt is not sent: the
/// payload is fixed and the echoed title comes back as the answer.
#[derive(Clone)]
pub struct DemoClient {
    client: Client,
    endpoint_url: String,
    delay: Duration,
}

impl DemoClient {
    pub fn new(client: Client, endpoint_url: &str, delay: Duration) -> Self {
        Self {
            client,
            endpoint_url: endpoint_url.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl CompletionBackend for DemoClient {
    fn name(&self) -> &str {
        Provider::Demo.display_name()
    }

    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        debug!(prompt_len = prompt.len(), "demo backend ignores the prompt");

        let request = DemoRequest {
            title: "abc this is the sample test",
            user_id: 2,
        };
        let response = self
            .client
            .post(&self.endpoint_url)
            .json(&request)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        let demo: DemoResponse = serde_json::from_str(&body)?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        demo.title
            .map(|title| title.trim().to_string())
            .ok_or(BackendError::NoChoice)
    }
}
