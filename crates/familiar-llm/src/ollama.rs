use std::time::{Duration, Instant};

use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use tracing::{debug, info};

use familiar_core::config::LlmSettings;
use familiar_core::traits::Generator;
use familiar_core::types::GenerationParams;
use familiar_core::{Error, Result};

const DEFAULT_PORT: u16 = 11434;

/// Generator backed by a model served from a local Ollama runtime.
///
/// Each call first checks that the model is pulled, then sends a single
/// non-streaming chat request. There is no retry and no fallback model.
pub struct OllamaGenerator {
    client: Ollama,
    base_url: String,
    model: String,
    timeout: Option<Duration>,
    rt: tokio::runtime::Runtime,
}

impl OllamaGenerator {
    pub fn new(model: &str, settings: &LlmSettings) -> Result<Self> {
        let base_url = settings.base_url.trim().to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!("llm.base_url '{base_url}' must start with http:// or https://")));
        }
        let (host, port) = parse_host_port(&base_url);
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            client: Ollama::new(host, port),
            base_url,
            model: model.to_string(),
            timeout: settings.timeout_secs.map(Duration::from_secs),
            rt,
        })
    }

    async fn ensure_model(&self) -> Result<()> {
        let models = self.client.list_local_models().await.map_err(|e| {
            Error::unavailable(&self.model, format!("Ollama at {} is not reachable: {e}", self.base_url))
        })?;
        let tagged = format!("{}:latest", self.model);
        if models.iter().any(|m| m.name == self.model || m.name == tagged) {
            return Ok(());
        }
        Err(Error::unavailable(
            &self.model,
            format!("not present in the local runtime; run `ollama pull {}`", self.model),
        ))
    }

    async fn chat(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.ensure_model().await?;
        let request = ChatMessageRequest::new(self.model.clone(), vec![ChatMessage::user(prompt.to_owned())])
            .options(model_options(params));
        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| Error::Generation(format!("Ollama chat request failed: {e}")))?;
        Ok(response.message.content)
    }
}

impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let start = Instant::now();
        info!(model = %self.model, prompt_chars = prompt.len(), "generating answer");
        let text = match self.timeout {
            Some(limit) => self
                .rt
                .block_on(async { tokio::time::timeout(limit, self.chat(prompt, params)).await })
                .map_err(|_| Error::Generation(format!("no response from {} within {}s", self.model, limit.as_secs())))??,
            None => self.rt.block_on(self.chat(prompt, params))?,
        };
        debug!(model = %self.model, elapsed_ms = start.elapsed().as_millis(), "generation finished");
        Ok(text)
    }
}

fn model_options(params: &GenerationParams) -> ModelOptions {
    let mut options = ModelOptions::default();
    if let Some(t) = params.temperature {
        options = options.temperature(t);
    }
    if let Some(n) = params.max_tokens {
        options = options.num_predict(i32::try_from(n).unwrap_or(i32::MAX));
    }
    options
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        if let Ok(port) = url[colon_pos + 1..].parse::<u16>() {
            return (url[..colon_pos].to_string(), port);
        }
    }
    (url.to_string(), DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_variants() {
        assert_eq!(parse_host_port("http://localhost:11434"), ("http://localhost".into(), 11434));
        assert_eq!(parse_host_port("http://localhost"), ("http://localhost".into(), 11434));
        assert_eq!(parse_host_port("http://example.com:8080/"), ("http://example.com".into(), 8080));
    }

    #[test]
    fn rejects_base_url_without_scheme() {
        let settings = LlmSettings { base_url: "localhost:11434".into(), timeout_secs: None };
        assert!(matches!(OllamaGenerator::new("gemma3:1b", &settings), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unreachable_runtime_is_unavailable() {
        // Port 9 (discard) is not an Ollama runtime on any test host.
        let settings = LlmSettings { base_url: "http://127.0.0.1:9".into(), timeout_secs: Some(5) };
        let generator = OllamaGenerator::new("gemma3:1b", &settings).unwrap();
        assert_eq!(generator.model_id(), "gemma3:1b");
        let err = generator.generate("hello", &GenerationParams::default()).unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable { .. }), "{err}");
    }
}
