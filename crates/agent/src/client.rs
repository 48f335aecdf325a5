//! The abstract LLM decision client (`spec.md` §6, §9 REDESIGN FLAGS).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

/// A capability with a single method: produce the next raw reply given a
/// system prompt, a user message, and a schema description.
///
/// Parsing, retries, and schema enforcement all live in [`crate::decision`]
/// and [`crate::decision_loop`], independent of the concrete client. Two
/// implementations are expected in practice: a chat-completions client that
/// supports a `response_format = json_object` hint, and a fallback that
/// does not — both satisfy this same trait.
#[async_trait]
pub trait AgentDecisionClient: Send + Sync {
    /// Produce the raw model reply. Implementations should honor
    /// `cancellation` where possible but are not required to abort an
    /// in-flight call.
    ///
    /// # Errors
    /// Returns [`AgentError::Client`] on transport/provider failure.
    async fn decide(
        &self,
        system_prompt: &str,
        user_text: &str,
        schema_text: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, AgentError>;
}

/// Stands in for a decision client when no provider credential was
/// configured at startup. `spec.md` §8: "Missing `OPENAI_API_KEY` at run
/// time fails the first node's loop with a clear `RuntimeError`, run status
/// `failed`" — this client is what turns that into exactly that failure
/// instead of a panic or a confusing transport error.
pub struct MissingApiKeyClient;

#[async_trait]
impl AgentDecisionClient for MissingApiKeyClient {
    async fn decide(
        &self,
        _system_prompt: &str,
        _user_text: &str,
        _schema_text: &str,
        _cancellation: &CancellationToken,
    ) -> Result<String, AgentError> {
        Err(AgentError::Client(
            "no AgentDecisionClient configured: OPENAI_API_KEY is unset".to_string(),
        ))
    }
}

/// Chat-completions-shaped client against an OpenAI-compatible endpoint,
/// requesting `response_format: {"type": "json_object"}` (`spec.md` §6).
///
/// Construct with [`OpenAiChatDecisionClient::new`]; `base_url` defaults to
/// `https://api.openai.com/v1` and can be pointed at any OpenAI-compatible
/// gateway.
pub struct OpenAiChatDecisionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatDecisionClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl AgentDecisionClient for OpenAiChatDecisionClient {
    async fn decide(
        &self,
        system_prompt: &str,
        user_text: &str,
        schema_text: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, AgentError> {
        let body = serde_json::json!({
            "model": self.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": format!("{user_text}\n\nRespond with JSON matching this schema:\n{schema_text}")},
            ],
        });

        let request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            result = request => result.map_err(|e| AgentError::Client(e.to_string()))?,
            () = cancellation.cancelled() => {
                return Err(AgentError::Client("cancelled before response was received".to_string()));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Client(format!(
                "decision client returned {status}: {text}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Client(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                AgentError::Client("response carried no choices[0].message.content".to_string())
            })
    }
}

/// Same wire shape as [`OpenAiChatDecisionClient`] but omits the
/// `response_format` hint, for providers that reject or ignore it
/// (`spec.md` §6: "a fallback client that does not [support it]").
pub struct FallbackChatDecisionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl FallbackChatDecisionClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl AgentDecisionClient for FallbackChatDecisionClient {
    async fn decide(
        &self,
        system_prompt: &str,
        user_text: &str,
        schema_text: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, AgentError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": format!(
                    "{user_text}\n\nRespond with a single JSON object, and nothing else, matching this schema:\n{schema_text}"
                )},
            ],
        });

        let request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            result = request => result.map_err(|e| AgentError::Client(e.to_string()))?,
            () = cancellation.cancelled() => {
                return Err(AgentError::Client("cancelled before response was received".to_string()));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Client(format!(
                "decision client returned {status}: {text}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Client(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                AgentError::Client("response carried no choices[0].message.content".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn missing_api_key_client_always_errors() {
        let client = MissingApiKeyClient;
        let cancellation = CancellationToken::new();
        let err = client
            .decide("system", "user", "schema", &cancellation)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Client(_)));
    }

    #[tokio::test]
    async fn chat_client_extracts_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"action\": \"final\", \"summary\": \"ok\"}"}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiChatDecisionClient::new("test-key", "gpt-test")
            .with_base_url(server.uri());
        let cancellation = CancellationToken::new();
        let reply = client
            .decide("system", "user", "schema", &cancellation)
            .await
            .unwrap();
        assert!(reply.contains("\"action\""));
    }

    #[tokio::test]
    async fn chat_client_surfaces_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = OpenAiChatDecisionClient::new("test-key", "gpt-test")
            .with_base_url(server.uri());
        let cancellation = CancellationToken::new();
        let err = client
            .decide("system", "user", "schema", &cancellation)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Client(_)));
    }
}
