//! REST client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::retry::retry_on_rate_limit;
use super::wire::{GeminiRequest, GeminiResponse};
use super::{GeminiError, GenerateRequest, GenerateResponse, GenerativeModel, Part};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini client bound to one model.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a client for `model`, reading the key from `GEMINI_API_KEY`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .user_agent(concat!("footage/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set the API key, overriding the environment.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Point the client at a different API root (e.g. a proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GeminiError> {
        let api_key = self.api_key.as_deref().ok_or(GeminiError::MissingApiKey)?;
        let url = self.endpoint();
        let body = GeminiRequest::from(request);

        let inline_bytes: usize = request
            .parts
            .iter()
            .map(|p| match p {
                Part::InlineData { data, .. } => data.len(),
                Part::Text(_) => 0,
            })
            .sum();
        debug!(
            "Gemini {} request: {} parts, {} inline bytes",
            self.model,
            request.parts.len(),
            inline_bytes
        );

        let response = retry_on_rate_limit(&self.model, || {
            let mut builder = self
                .http
                .post(&url)
                .header(API_KEY_HEADER, api_key)
                .json(&body);
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }
            builder.send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(GeminiError::Api {
                status: error.code,
                message: error.message,
            });
        }

        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key() {
        let mut client = GeminiClient::new("gemini-test");
        client.api_key = None;

        let request = GenerateRequest::json(vec![Part::Text("hello".into())]);
        let result = client.generate(&request).await;
        assert!(matches!(result, Err(GeminiError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let client = GeminiClient::new("gemini-test")
            .with_api_key("SECRET-KEY-123")
            .with_base_url("http://127.0.0.1:1/v1beta");

        let request = GenerateRequest::json(vec![Part::Text("hello".into())]);
        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, GeminiError::Http(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));

        let stored = crate::analysis::AnalysisError::from(err).to_string();
        assert!(!stored.contains("SECRET-KEY-123"));
    }

    #[test]
    fn test_endpoint_format() {
        let client = GeminiClient::new("gemini-1.5-pro").with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-1.5-pro:generateContent"
        );
        assert_eq!(client.model_name(), "gemini-1.5-pro");
    }
}
