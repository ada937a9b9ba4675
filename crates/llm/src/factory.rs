//! Model client factory.
//!
//! Maps a provider name from configuration to a concrete `LlmClient`.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, OllamaClient, ScriptedClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;

/// Create a model client for `provider`.
///
/// # Arguments
/// * `provider` - Provider identifier ("gemini", "ollama", "scripted")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key, required by Gemini
/// * `timeout_secs` - Optional request timeout (Ollama)
///
/// # Errors
/// Returns an error if the provider is unknown, a required secret is missing,
/// or the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    match provider_type {
        ProviderType::Gemini => {
            let api_key = api_key.ok_or_else(|| "Gemini provider requires API key".to_string())?;
            let client = match endpoint {
                Some(base_url) => GeminiClient::with_base_url(base_url, api_key),
                None => GeminiClient::new(api_key),
            };
            Ok(Arc::new(client))
        }
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(crate::providers::ollama::DEFAULT_OLLAMA_ENDPOINT);
            match timeout_secs {
                Some(secs) => {
                    let client = OllamaClient::with_timeout(base_url, Duration::from_secs(secs))
                        .map_err(|e| e.to_string())?;
                    Ok(Arc::new(client))
                }
                None => Ok(Arc::new(OllamaClient::with_base_url(base_url))),
            }
        }
        ProviderType::Scripted => Ok(Arc::new(ScriptedClient::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_timeout() {
        let client = create_client("ollama", Some("http://localhost:8080"), None, Some(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_gemini_client() {
        let client = create_client("gemini", None, Some("secret"), None).unwrap();
        assert_eq!(client.provider_name(), "gemini");
    }

    #[test]
    fn test_gemini_requires_api_key() {
        match create_client("gemini", None, None, None) {
            Err(err) => assert!(err.contains("Gemini provider requires API key")),
            Ok(_) => panic!("Expected error for Gemini without API key"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None, None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
