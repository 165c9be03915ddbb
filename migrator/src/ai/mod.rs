//! AI client for schema generation.
//!
//! Talks to an Ollama service, either a local instance (`/api/generate`) or
//! the hosted one (`/api/chat`, bearer token), and turns its free-form answer
//! into a [`Schema`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use csvmigrate::ai::{AiClient, TextGenerator, parse_schema_response};
//! use csvmigrate::config::AiConfig;
//!
//! let client = AiClient::new(AiConfig::from_env()?)?;
//! let text = client.generate(&prompt).await?;
//! let schema = parse_schema_response(&text)?;
//! ```

pub mod prompt;

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::logs::log_warning;
use crate::config::{AiConfig, AiMode};
use crate::error::{AiError, AiResult};
use crate::models::Schema;

pub use prompt::{source_schema_prompt, target_schema_prompt};

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// How much of a bad response is quoted back in errors
const RESPONSE_EXCERPT_CHARS: usize = 500;

static THINK_BLOCK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").ok());

/// Anything that turns a prompt into text.
///
/// The schema generator only depends on this, so tests can plug in canned
/// answers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> AiResult<String>;
}

// Local Ollama wire types

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

// Hosted Ollama wire types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama HTTP client
#[derive(Clone)]
pub struct AiClient {
    config: AiConfig,
    http: reqwest::Client,
}

impl AiClient {
    /// Create a client; the request timeout comes from the config.
    pub fn new(config: AiConfig) -> AiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AiError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Single request, no retries.
    async fn call_once(&self, prompt: &str) -> AiResult<String> {
        match self.config.mode {
            AiMode::Local => self.call_local(prompt).await,
            AiMode::Cloud => self.call_cloud(prompt).await,
        }
    }

    async fn call_local(&self, prompt: &str) -> AiResult<String> {
        let body = GenerateRequest {
            model: &self.config.local_model,
            prompt,
            stream: false,
        };

        tracing::debug!(endpoint = %self.config.local_endpoint, model = %self.config.local_model, "calling local model");
        let response = self
            .http
            .post(&self.config.local_endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;

        let text = read_success_body(response).await?;
        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| AiError::InvalidResponse(format!("{e}: {}", excerpt(&text))))?;
        Ok(parsed.response)
    }

    async fn call_cloud(&self, prompt: &str) -> AiResult<String> {
        let api_key = self.config.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let body = ChatRequest {
            model: &self.config.cloud_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        tracing::debug!(endpoint = %self.config.cloud_endpoint, model = %self.config.cloud_model, "calling hosted model");
        let response = self
            .http
            .post(&self.config.cloud_endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;

        let text = read_success_body(response).await?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| AiError::InvalidResponse(format!("{e}: {}", excerpt(&text))))?;
        Ok(parsed.message.content)
    }
}

#[async_trait]
impl TextGenerator for AiClient {
    /// Call the configured service, retrying failed attempts.
    ///
    /// A missing API key is returned at once since retrying cannot fix it.
    async fn generate(&self, prompt: &str) -> AiResult<String> {
        let attempts = self.config.max_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.call_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(AiError::MissingApiKey) => return Err(AiError::MissingApiKey),
                Err(e) if attempt < attempts => {
                    log_warning(format!("Attempt {}/{} failed: {}", attempt, attempts, e));
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_success_body(response: reqwest::Response) -> AiResult<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AiError::Http(e.to_string()))?;

    if !status.is_success() {
        return Err(AiError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn excerpt(text: &str) -> String {
    text.chars().take(RESPONSE_EXCERPT_CHARS).collect()
}

/// Turn a model answer into a schema.
///
/// Drops `<think>` reasoning, markdown fences and prose around the outermost
/// JSON array before decoding.
pub fn parse_schema_response(response: &str) -> AiResult<Schema> {
    let json = extract_json(response);

    Schema::from_json(&json).map_err(|e| {
        AiError::InvalidResponse(format!("{}. Response was: {}", e, excerpt(response)))
    })
}

/// Extract the JSON array from a response that may contain reasoning or markdown
fn extract_json(text: &str) -> String {
    let without_think = match THINK_BLOCK.as_ref() {
        Some(re) => re.replace_all(text, ""),
        None => Cow::Borrowed(text),
    };
    // An unclosed block still ends at the last closing tag
    let text = match without_think.rfind("</think>") {
        Some(pos) => &without_think[pos + "</think>".len()..],
        None => &without_think[..],
    };

    let text = strip_code_fence(text.trim());

    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after_start = start + 3;
    // Skip language identifier if present
    let content_start = text[after_start..]
        .find('\n')
        .map(|i| after_start + i + 1)
        .unwrap_or(after_start);

    match text[content_start..].find("```") {
        Some(end) => text[content_start..content_start + end].trim(),
        None => text[content_start..].trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_array() {
        let schema = parse_schema_response(r#"[{"column": "id", "values": []}]"#).unwrap();
        assert_eq!(schema.column_names(), vec!["id"]);
    }

    #[test]
    fn test_parse_code_block() {
        let response = r#"Here's the schema:

```json
[
  {"column": "active", "target_column": "is_active", "values": ["Y", "N"],
   "values_mapping": {"Y": "true", "N": "false"}}
]
```

Done!"#;

        let schema = parse_schema_response(response).unwrap();
        let column = schema.get("active").unwrap();
        assert_eq!(column.mapped_target(), Some("is_active"));
        assert_eq!(column.map_value("Y"), "true");
    }

    #[test]
    fn test_parse_think_block() {
        let response = "<think>maybe [1,2] here?</think>\n[{\"column\": \"role\", \"values\": [\"admin\"]}]";
        let schema = parse_schema_response(response).unwrap();
        assert_eq!(schema.len(), 1);
        assert!(schema.get("role").unwrap().is_categorical());
    }

    #[test]
    fn test_parse_unopened_think_tail() {
        let response = "reasoning [x] </think>[{\"column\": \"a\", \"values\": []}]";
        assert_eq!(parse_schema_response(response).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_null_column() {
        let response = r#"[{"column": null, "target_column": "age", "values": [], "values_mapping": null}]"#;
        let schema = parse_schema_response(response).unwrap();
        assert_eq!(schema.columns()[0].column, "");
    }

    #[test]
    fn test_parse_invalid_response() {
        let err = parse_schema_response("I could not find any columns.").unwrap_err();
        match err {
            AiError::InvalidResponse(msg) => assert!(msg.contains("could not find")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cloud_without_key_fails_fast() {
        let config = AiConfig {
            max_retries: 5,
            ..AiConfig::default()
        };
        let client = AiClient::new(config).unwrap();

        let started = std::time::Instant::now();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, AiError::MissingApiKey));
        assert!(started.elapsed() < Duration::from_millis(RETRY_DELAY_MS));
    }

    #[tokio::test]
    async fn test_local_connection_error_is_http() {
        let config = AiConfig {
            mode: AiMode::Local,
            local_endpoint: "http://127.0.0.1:9/api/generate".into(),
            max_retries: 1,
            timeout_secs: 2,
            ..AiConfig::default()
        };
        let client = AiClient::new(config).unwrap();

        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, AiError::Http(_)));
    }
}
