use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{check_status, CompletionBackend};
use crate::error::BackendError;
use crate::provider::Provider;

#[derive(Serialize)]
struct QuestionRequest<'a> {
    question: &'a str,
}

/// The CityHub backend: POST `{ "question": ... }`, the whole body is the answer
#[derive(Clone)]
pub struct LocalClient {
    client: Client,
    endpoint_url: String,
}

impl LocalClient {
    pub fn new(client: Client, endpoint_url: &str) -> Self {
        Self {
            client,
            endpoint_url: endpoint_url.to_string(),
        }
    }
}

#[async_trait]
impl CompletionBackend for LocalClient {
    fn name(&self) -> &str {
        Provider::Local.display_name()
    }

    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(&self.endpoint_url)
            .json(&QuestionRequest { question: prompt })
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        debug!(bytes = body.len(), "local backend answered");
        Ok(extract_answer(&body))
    }
}

/// The server may answer with plain text or with a JSON string literal
fn extract_answer(body: &str) -> String {
    match serde_json::from_str::<String>(body) {
        Ok(text) => text.trim().to_string(),
        Err(_) => body.trim().to_string(),
    }
}
