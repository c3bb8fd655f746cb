//! A small synchronous wrapper around the `llm` crate, so repair tools share one configuration
//! format and one way of building clients and cleaning up responses.

use llm::LLMProvider;
use llm::builder::{LLMBackend, LLMBuilder};
pub use llm::chat::ChatMessage;
use llm::chat::StructuredOutputFormat;
use serde::Deserialize;
use std::str::FromStr;

/// API Key wrapper that hides the key in debug output.
#[derive(Deserialize)]
pub struct ApiKey(pub String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("********")
    }
}

/// Configuration for LLM clients.
#[derive(Debug, Deserialize)]
pub struct LLMConfig {
    /// Base URL of the LLM service. Example: "http://[::1]:11434"
    pub address: Option<String>,

    pub api_key: Option<ApiKey>,

    /// Which backend to use, e.g. "openai" or "ollama".
    pub backend: String,

    /// Name of the model to invoke.
    pub model: String,

    /// Maximum output tokens.
    pub max_tokens: u32,
}

/// An LLM client configured with a system prompt.
pub struct BumpLLM {
    client: Box<dyn LLMProvider>,
}

impl BumpLLM {
    /// Builds a client. `output_format_json`, when given, is a JSON structured-output schema.
    pub fn build(
        config: &LLMConfig,
        output_format_json: Option<&str>,
        system_prompt: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let backend = LLMBackend::from_str(&config.backend)
            .map_err(|e| format!("unknown LLM backend {:?}: {e}", config.backend))?;

        let mut llm_builder = LLMBuilder::new()
            .backend(backend)
            .model(&config.model)
            .max_tokens(config.max_tokens)
            .temperature(0.0)
            .system(system_prompt);

        if let Some(schema) = output_format_json {
            let output_format: StructuredOutputFormat = serde_json::from_str(schema)?;
            llm_builder = llm_builder.schema(output_format);
        }
        if let Some(ref address) = config.address
            && !address.is_empty()
        {
            llm_builder = llm_builder.base_url(address);
        }
        if let Some(ref api_key) = config.api_key
            && !api_key.0.is_empty()
        {
            llm_builder = llm_builder.api_key(&api_key.0);
        }

        let client = llm_builder.build()?;
        Ok(Self { client })
    }

    /// Sends `request` and returns the response text.
    pub fn invoke(&self, request: &[ChatMessage]) -> Result<String, Box<dyn std::error::Error>> {
        let response = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?
            .block_on(self.client.chat(request))?
            .text()
            .ok_or("LLM response contained no text")?;
        Ok(response)
    }
}

/// Builds a request with one user message per entry of `contents`.
pub fn build_request<S: AsRef<str>>(contents: &[S]) -> Vec<ChatMessage> {
    contents
        .iter()
        .map(|content| ChatMessage::user().content(content.as_ref()).build())
        .collect()
}
