//! Chat-completion client for asking a model about recognized text

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("missing API key in env var {0}")]
    MissingApiKey(String),
    #[error("chat endpoint returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("could not decode chat response: {0}")]
    Decode(String),
    #[error("model returned empty text")]
    EmptyResponse,
}

/// One question to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub max_response_tokens: u32,
}

pub trait ChatProvider {
    /// The model's trimmed reply. An empty reply is an error.
    fn ask(&self, request: &ChatRequest) -> Result<String, ChatError>;

    /// Swap model settings in place
    fn reconfigure(&mut self, settings: ChatSettings);

    /// Smoke test: ask for a two-line poem
    fn probe(&self, max_response_tokens: u32) -> Result<String, ChatError> {
        self.ask(&ChatRequest {
            system_prompt: "Write a two-line poem.".to_string(),
            user_text: "About a kite.".to_string(),
            max_response_tokens,
        })
    }
}

/// Connection settings, usually taken from the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub api_key_env: String,
    pub endpoint: String,
    pub model: String,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// Newer model families only accept `max_completion_tokens`
fn uses_completion_token_key(model: &str) -> bool {
    model.starts_with("gpt-5")
}

fn build_body<'a>(model: &'a str, request: &'a ChatRequest) -> CompletionRequest<'a> {
    let system = if request.system_prompt.trim().is_empty() {
        DEFAULT_SYSTEM_PROMPT
    } else {
        request.system_prompt.as_str()
    };
    let tokens = request.max_response_tokens;
    let completion_key = uses_completion_token_key(model);
    CompletionRequest {
        model,
        messages: [
            Message {
                role: "system",
                content: system,
            },
            Message {
                role: "user",
                content: &request.user_text,
            },
        ],
        max_tokens: (!completion_key).then_some(tokens),
        max_completion_tokens: completion_key.then_some(tokens),
    }
}

/// Reply text is the first choice's content, or its refusal
fn extract_reply(body: &str) -> Result<String, ChatError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| ChatError::Decode(e.to_string()))?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .map(|m| {
            let content = m.content.unwrap_or_default().trim().to_string();
            if content.is_empty() {
                m.refusal.unwrap_or_default().trim().to_string()
            } else {
                content
            }
        })
        .unwrap_or_default();
    if text.is_empty() {
        Err(ChatError::EmptyResponse)
    } else {
        Ok(text)
    }
}

pub struct OpenAiClient {
    http: Client,
    settings: ChatSettings,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(settings: ChatSettings) -> Result<Self, ChatError> {
        let http = Client::builder()
            .user_agent(concat!("ocrbox/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let api_key = read_api_key(&settings.api_key_env);
        Ok(Self {
            http,
            settings,
            api_key,
        })
    }
}

fn read_api_key(env_var: &str) -> String {
    std::env::var(env_var).unwrap_or_default()
}

impl ChatProvider for OpenAiClient {
    fn ask(&self, request: &ChatRequest) -> Result<String, ChatError> {
        if self.api_key.is_empty() {
            return Err(ChatError::MissingApiKey(self.settings.api_key_env.clone()));
        }

        let body = build_body(&self.settings.model, request);
        log::info!(
            "Asking {} ({} chars of input)",
            self.settings.model,
            request.user_text.len()
        );
        let response = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if status.is_client_error() || status.is_server_error() {
            log::error!("Chat endpoint returned {status}");
            return Err(ChatError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        extract_reply(&text)
    }

    /// Also re-reads the API key from the (possibly new) env var
    fn reconfigure(&mut self, settings: ChatSettings) {
        self.api_key = read_api_key(&settings.api_key_env);
        self.settings = settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(system: &str) -> ChatRequest {
        ChatRequest {
            system_prompt: system.to_string(),
            user_text: "2 + 2?".to_string(),
            max_response_tokens: 128,
        }
    }

    #[test]
    fn gpt5_models_use_completion_token_key() {
        let req = request("Be brief.");
        let body = serde_json::to_value(build_body("gpt-5-mini", &req)).unwrap();
        assert_eq!(body["max_completion_tokens"], 128);
        assert!(body.get("max_tokens").is_none());

        let body = serde_json::to_value(build_body("gpt-4o", &req)).unwrap();
        assert_eq!(body["max_tokens"], 128);
        assert!(body.get("max_completion_tokens").is_none());
    }

    #[test]
    fn body_carries_system_and_user_messages() {
        let body = serde_json::to_value(build_body("gpt-5", &request("  "))).unwrap();
        assert_eq!(body["model"], "gpt-5");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], DEFAULT_SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "2 + 2?");
    }

    #[test]
    fn reply_prefers_content_then_refusal() {
        let ok = r#"{"choices":[{"message":{"content":"  4  "}}]}"#;
        assert_eq!(extract_reply(ok).unwrap(), "4");

        let refused = r#"{"choices":[{"message":{"content":null,"refusal":"I can't help."}}]}"#;
        assert_eq!(extract_reply(refused).unwrap(), "I can't help.");
    }

    #[test]
    fn empty_or_malformed_replies_are_errors() {
        assert!(matches!(
            extract_reply(r#"{"choices":[]}"#),
            Err(ChatError::EmptyResponse)
        ));
        assert!(matches!(
            extract_reply(r#"{"choices":[{"message":{"content":"   "}}]}"#),
            Err(ChatError::EmptyResponse)
        ));
        assert!(matches!(extract_reply("{}"), Err(ChatError::EmptyResponse)));
        assert!(matches!(extract_reply("<html>"), Err(ChatError::Decode(_))));
    }

    fn settings(env: &str, model: &str) -> ChatSettings {
        ChatSettings {
            api_key_env: env.to_string(),
            endpoint: "http://127.0.0.1:9/never".to_string(),
            model: model.to_string(),
        }
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let client = OpenAiClient::new(settings("OCRBOX_TEST_KEY_THAT_IS_NOT_SET", "gpt-5")).unwrap();
        match client.ask(&request("")) {
            Err(ChatError::MissingApiKey(var)) => {
                assert_eq!(var, "OCRBOX_TEST_KEY_THAT_IS_NOT_SET")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(client.probe(16), Err(ChatError::MissingApiKey(_))));
    }

    #[test]
    fn reconfigure_replaces_settings() {
        let mut client = OpenAiClient::new(settings("OCRBOX_TEST_UNSET_A", "gpt-5")).unwrap();
        client.reconfigure(settings("OCRBOX_TEST_UNSET_B", "gpt-4o"));
        match client.ask(&request("")) {
            Err(ChatError::MissingApiKey(var)) => assert_eq!(var, "OCRBOX_TEST_UNSET_B"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
