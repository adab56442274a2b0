//! Model-string routing
//!
//! A model is written as `provider/model` (`openai/gpt-4o`,
//! `anthropic/claude-sonnet-4-20250514`). A bare name goes to OpenAI.

use super::*;

/// A concrete provider picked from a model string
pub enum Gateway {
    OpenAI(OpenAIProvider),
    Anthropic(AnthropicProvider),
}

/// Split `provider/model` into its parts.
///
/// Unknown prefixes are an error; names without a slash are OpenAI models.
pub fn parse_model(model_str: &str) -> Result<(ProviderType, &str), ProviderError> {
    let model_str = model_str.trim();
    match model_str.split_once('/') {
        Some((prefix, model)) => {
            let provider = ProviderType::from_prefix(prefix)
                .ok_or_else(|| ProviderError::UnknownProvider(prefix.to_string()))?;
            if model.is_empty() {
                return Err(ProviderError::InvalidRequest(format!(
                    "empty model name in '{}'",
                    model_str
                )));
            }
            Ok((provider, model))
        }
        None if model_str.is_empty() => {
            Err(ProviderError::InvalidRequest("empty model name".into()))
        }
        None => Ok((ProviderType::OpenAI, model_str)),
    }
}

impl Gateway {
    /// Build a provider for `model_str`.
    ///
    /// `api_key` falls back to the provider's environment variable.
    pub fn from_model(
        model_str: &str,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, ProviderError> {
        let (provider, model) = parse_model(model_str)?;
        let api_key = api_key
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(provider.api_key_env()).ok())
            .unwrap_or_default();

        let config = match provider {
            ProviderType::OpenAI => ProviderConfig::openai(api_key),
            ProviderType::Anthropic => ProviderConfig::anthropic(api_key),
        }
        .with_model(model);
        let config = match base_url {
            Some(url) => config.with_base_url(url),
            None => config,
        };

        Self::from_config(config)
    }

    pub fn from_config(config: ProviderConfig) -> Result<Self, ProviderError> {
        Ok(match config.provider_type {
            ProviderType::OpenAI => Gateway::OpenAI(OpenAIProvider::new(config)?),
            ProviderType::Anthropic => Gateway::Anthropic(AnthropicProvider::new(config)?),
        })
    }
}

impl LlmProvider for Gateway {
    fn name(&self) -> &str {
        match self {
            Gateway::OpenAI(p) => p.name(),
            Gateway::Anthropic(p) => p.name(),
        }
    }

    fn default_model(&self) -> &str {
        match self {
            Gateway::OpenAI(p) => p.default_model(),
            Gateway::Anthropic(p) => p.default_model(),
        }
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        match self {
            Gateway::OpenAI(p) => p.complete(request).await,
            Gateway::Anthropic(p) => p.complete(request).await,
        }
    }
}
