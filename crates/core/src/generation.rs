use crate::error::RagError;
use crate::models::GenerationParams;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Text generation capability. Returns only the continuation, never the prompt.
pub trait Generator {
    fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, RagError>;
}

impl<T: Generator + ?Sized> Generator for Box<T> {
    fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, RagError> {
        (**self).generate(prompt, params)
    }
}

/// Wraps a user prompt in the instruct chat template the models expect.
pub fn format_chat_prompt(prompt: &str) -> String {
    format!("<|system|>\nYou are a helpful AI assistant.</s>\n<|user|>\n{prompt}</s>\n<|assistant|>\n")
}

/// Drops an echoed prompt from the model output.
pub fn strip_prompt_echo(formatted_prompt: &str, output: &str) -> String {
    output.replace(formatted_prompt, "").trim().to_string()
}

#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:8080/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Blocking client for OpenAI-compatible `/completions` endpoints.
pub struct HttpGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

impl HttpGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self, RagError> {
        if config.model.trim().is_empty() {
            return Err(RagError::Generation("missing generation model name".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/completions", config.base_url.trim_end_matches('/')),
            model: config.model,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
        })
    }
}

impl Generator for HttpGenerator {
    fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, RagError> {
        let formatted = format_chat_prompt(prompt);
        let mut request = self.client.post(&self.endpoint).json(&CompletionRequest {
            model: &self.model,
            prompt: &formatted,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.trim());
        }

        let response = request.send().map_err(|error| {
            RagError::Generation(format!("request to {} failed: {error}", self.endpoint))
        })?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RagError::Generation(format!(
                "{} returned {status}: {body}",
                self.endpoint
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .map_err(|error| RagError::Generation(format!("invalid completion response: {error}")))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| RagError::Generation("completion had no choices".to_string()))?;

        debug!(
            model = %self.model,
            max_tokens = params.max_tokens,
            output_chars = text.len(),
            "generated completion"
        );
        Ok(strip_prompt_echo(&formatted, &text))
    }
}
