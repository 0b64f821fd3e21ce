//! Text-generation clients.
//!
//! Blocking reqwest clients (no async runtime). One request per prompt, no
//! retry. Both backends sit behind [`TextGenerator`] so the analysis code and
//! its tests never touch HTTP.

use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::config::{Backend, LlmConfig};
use crate::error::LlmError;

/// Timeout for the model-listing health check.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything that can answer a prompt with text.
pub trait TextGenerator: Send + Sync {
    /// Submit one prompt and return the generated text verbatim.
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Names of the models the endpoint can serve.
    fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

/// Build the client selected by `config.backend`.
pub fn build_generator(config: &LlmConfig) -> Result<Box<dyn TextGenerator>, LlmError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.backend {
        Backend::Ollama => Ok(Box::new(OllamaClient::new(
            &config.base_url,
            &config.model,
            timeout,
        )?)),
        Backend::ChatCompletions => {
            let key = config
                .resolve_api_key()
                .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
            Ok(Box::new(ChatCompletionsClient::new(
                &config.base_url,
                &config.model,
                &key,
                config.temperature,
                timeout,
            )?))
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, LlmError> {
    reqwest::blocking::Client::builder()
        .user_agent(format!("rusty-analyst/{}", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Transport(e.to_string()))
}

/// Send a request and turn non-2xx statuses into [`LlmError::Http`].
fn send(request: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response, LlmError> {
    let response = request
        .send()
        .map_err(|e| LlmError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(LlmError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::blocking::Response,
) -> Result<T, LlmError> {
    response.json::<T>().map_err(|e| LlmError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

/// Client for a local Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        Ok(OllamaClient {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!("POST {url} ({} prompt chars)", prompt.len());
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let response = send(self.http.post(&url).json(&body))?;
        Ok(parse_json::<GenerateResponse>(response)?.response)
    }

    fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = send(self.http.get(&url).timeout(HEALTH_TIMEOUT))?;
        let tags: TagsResponse = parse_json(response)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

// ---------------------------------------------------------------------------
// Chat completions (OpenAI / DeepSeek compatible)
// ---------------------------------------------------------------------------

/// Client for a remote, key-authenticated chat-completions API.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(ChatCompletionsClient {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature,
        })
    }
}

impl TextGenerator for ChatCompletionsClient {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {url} ({} prompt chars)", prompt.len());
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });
        let response = send(
            self.http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body),
        )?;
        let chat: ChatResponse = parse_json(response)?;
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("response has no choices".to_string()))
    }

    fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = send(
            self.http
                .get(&url)
                .bearer_auth(&self.api_key)
                .timeout(HEALTH_TIMEOUT),
        )?;
        let list: ModelList = parse_json(response)?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn ollama(server: &MockServer) -> OllamaClient {
        OllamaClient::new(&server.base_url(), "codellama:7b", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_ollama_generate_returns_response_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "model": "codellama:7b", "response": "Sales are up.", "done": true }));
        });

        let answer = ollama(&server).generate("How are sales?").unwrap();
        assert_eq!(answer, "Sales are up.");
        mock.assert();
    }

    #[test]
    fn test_ollama_non_200_is_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(500).body("model crashed");
        });

        match ollama(&server).generate("q") {
            Err(LlmError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "model crashed");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_ollama_bad_body_is_parse_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).body("not json");
        });

        assert!(matches!(
            ollama(&server).generate("q"),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn test_ollama_lists_model_names() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "models": [{ "name": "codellama:7b" }, { "name": "llama3:8b" }] }));
        });

        let models = ollama(&server).list_models().unwrap();
        assert_eq!(models, vec!["codellama:7b", "llama3:8b"]);
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) is not expected to serve HTTP.
        let client =
            OllamaClient::new("http://127.0.0.1:9", "m", Duration::from_secs(2)).unwrap();
        assert!(matches!(client.generate("q"), Err(LlmError::Transport(_))));
    }

    #[test]
    fn test_chat_completions_sends_bearer_key() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer secret");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Looks fine." } }]
                }));
        });

        let client = ChatCompletionsClient::new(
            &server.base_url(),
            "deepseek-chat",
            "secret",
            0.7,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.generate("q").unwrap(), "Looks fine.");
        mock.assert();
    }

    #[test]
    fn test_chat_completions_empty_choices_is_parse_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "choices": [] }));
        });

        let client =
            ChatCompletionsClient::new(&server.base_url(), "m", "k", 0.7, Duration::from_secs(5))
                .unwrap();
        assert!(matches!(client.generate("q"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_chat_completions_lists_model_ids() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/models");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "object": "list", "data": [{ "id": "deepseek-chat" }] }));
        });

        let client =
            ChatCompletionsClient::new(&server.base_url(), "m", "k", 0.7, Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.list_models().unwrap(), vec!["deepseek-chat"]);
    }

    #[test]
    fn test_chat_backend_without_key_fails_to_build() {
        let config = LlmConfig {
            backend: Backend::ChatCompletions,
            api_key_env: "RUSTY_ANALYST_TEST_NO_SUCH_KEY".into(),
            ..Default::default()
        };
        assert!(matches!(
            build_generator(&config),
            Err(LlmError::MissingApiKey(name)) if name == "RUSTY_ANALYST_TEST_NO_SUCH_KEY"
        ));
    }
}
