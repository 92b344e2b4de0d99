//! OpenAI-compatible provider configuration.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::GatewayError;

/// Default model, matching the site assistant deployment.
pub const DEFAULT_MODEL: &str = "gpt-5-nano";
/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default output token budget per round.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 10_000;

/// Header used by Cloudflare AI Gateway for gateway-level auth.
pub const GATEWAY_AUTH_HEADER: &str = "cf-aig-authorization";

/// Configuration for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication
    pub api_key: SecretString,
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// `max_completion_tokens` sent with each request
    pub max_output_tokens: Option<u32>,
    /// Optional AI gateway token, sent as `cf-aig-authorization`
    pub gateway_token: Option<SecretString>,
    /// Connect timeout for the HTTP client
    pub connect_timeout: Duration,
}

impl OpenAiConfig {
    /// Create a configuration with defaults for everything but the key.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: Some(DEFAULT_MAX_OUTPUT_TOKENS),
            gateway_token: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the base URL (a trailing slash is dropped).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output token budget
    pub fn with_max_output_tokens(mut self, max: Option<u32>) -> Self {
        self.max_output_tokens = max;
        self
    }

    /// Set the AI gateway token
    pub fn with_gateway_token(mut self, token: SecretString) -> Self {
        self.gateway_token = Some(token);
        self
    }

    /// Chat completions URL.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(GatewayError::ConfigurationError(
                "API key cannot be empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(GatewayError::ConfigurationError(
                "Model cannot be empty".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GatewayError::ConfigurationError(
                "Base URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }

    /// Request headers, secrets included.
    pub fn headers(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            bearer(self.api_key.expose_secret(), "Authorization")?,
        );
        if let Some(token) = &self.gateway_token {
            headers.insert(
                HeaderName::from_static(GATEWAY_AUTH_HEADER),
                bearer(token.expose_secret(), GATEWAY_AUTH_HEADER)?,
            );
        }
        Ok(headers)
    }
}

fn bearer(secret: &str, header: &str) -> Result<HeaderValue, GatewayError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {secret}")).map_err(|_| {
        GatewayError::ConfigurationError(format!("Invalid characters in {header} credential"))
    })?;
    value.set_sensitive(true);
    Ok(value)
}
