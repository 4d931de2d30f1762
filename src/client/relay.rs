//! HTTP client for the relay's chat route

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::Relay;
use crate::api::ChatRequest;

/// Spoken when the relay answers without a `response` field
pub const NO_RESPONSE: &str = "No response from chatbot.";

#[derive(Deserialize)]
struct RelayReply {
    response: Option<String>,
}

/// Posts transcribed messages to the relay
pub struct RelayClient {
    client: reqwest::Client,
    url: Url,
}

impl RelayClient {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    async fn post(&self, message: &str) -> reqwest::Result<String> {
        let reply: RelayReply = self
            .client
            .post(self.url.clone())
            .json(&ChatRequest {
                message: message.to_string(),
            })
            .send()
            .await?
            .json()
            .await?;

        Ok(reply.response.unwrap_or_else(|| NO_RESPONSE.to_string()))
    }
}

#[async_trait(?Send)]
impl Relay for RelayClient {
    async fn ask(&self, message: &str) -> String {
        match self.post(message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, url = %self.url, "relay request failed");
                format!("Error contacting chatbot: {e}")
            }
        }
    }
}
