//! Completion backends: one trait, one implementation per endpoint flavour.

pub mod chat_completion;
pub mod demo;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::info;

pub use chat_completion::ChatCompletionClient;
pub use demo::DemoClient;
pub use local::LocalClient;

use crate::config::Settings;
use crate::error::{BackendError, ConfigError};
use crate::provider::Provider;

/// Sends a single user prompt to a completion endpoint and returns the text
/// to show as the bot's answer.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short label for headers and logs
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}

/// Build the backend the settings select
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn CompletionBackend>, ConfigError> {
    let client = Client::builder()
        .timeout(settings.request_timeout)
        .build()
        .map_err(ConfigError::Client)?;

    info!(
        provider = settings.provider.as_str(),
        endpoint = %settings.endpoint_url,
        "using completion backend"
    );

    let backend: Arc<dyn CompletionBackend> = match settings.provider {
        Provider::Local => Arc::new(LocalClient::new(client, &settings.endpoint_url)),
        Provider::Demo => Arc::new(DemoClient::new(
            client,
            &settings.endpoint_url,
            settings.demo_delay,
        )),
        Provider::Groq | Provider::OpenAI => Arc::new(ChatCompletionClient::new(
            client,
            settings.provider,
            &settings.endpoint_url,
            settings.model.as_deref().unwrap_or_default(),
            settings.api_key.clone(),
        )),
    };
    Ok(backend)
}

/// Turn a non-success status into an error carrying the response body
pub(crate) async fn check_status(response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status,
        body: body.trim().to_string(),
    })
}
