//! Backend router: builds the configured model backend.

use bolty_core::error::ProviderError;
use bolty_core::provider::ModelBackend;
use std::sync::Arc;
use std::time::Duration;

use crate::gemini::{self, GeminiBackend};
use crate::invoker::RetryPolicy;
use crate::openai_compat::OpenAiCompatBackend;

/// Build the backend named by `config.backend`.
pub fn build_from_config(
    config: &bolty_config::AppConfig,
) -> std::result::Result<Arc<dyn ModelBackend>, ProviderError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let name = config.backend.as_str();
    let api_key = config.api_key.clone().unwrap_or_default();

    if api_key.is_empty() && requires_key(name) {
        return Err(ProviderError::NotConfigured(format!(
            "no API key for backend '{name}' (set api_key or BOLTY_API_KEY)"
        )));
    }

    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(name));

    let backend: Arc<dyn ModelBackend> = if name == "gemini" {
        Arc::new(
            GeminiBackend::new(api_key)
                .with_base_url(base_url)
                .with_timeout(timeout),
        )
    } else {
        Arc::new(OpenAiCompatBackend::new(name, base_url, api_key).with_timeout(timeout))
    };

    Ok(backend)
}

/// Retry policy from configuration.
pub fn retry_policy(config: &bolty_config::AppConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.retry.max_retries,
        Duration::from_millis(config.retry.base_delay_ms),
    )
}

fn requires_key(backend: &str) -> bool {
    !matches!(backend, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known backends.
pub fn default_base_url(backend: &str) -> String {
    match backend {
        "gemini" => gemini::DEFAULT_BASE_URL.into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{backend}.api.example.com/v1"),
    }
}
