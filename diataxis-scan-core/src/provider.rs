//! # provider: hosted (OpenAI) and local (Ollama) classification backends
//!
//! Both backends implement [`Classifier`]. Which one runs is decided once at
//! startup by [`build_classifier`]; the rest of the pipeline never branches on
//! the provider again.
//!
//! Model output is free text that is *asked* to be JSON. [`parse_classification`]
//! extracts the outermost `{...}` span and validates it field by field, so a
//! missing key, a wrong type or an out-of-range percentage becomes a
//! [`ScanError::Parse`] instead of a partially filled result.

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::env;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::contract::{ClassificationResult, Classifier, ClassifyOptions, Quadrant};
use crate::error::ScanError;
use crate::prompt::SYSTEM_PROMPT;

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";

const MAX_RATE_LIMIT_RETRIES: u32 = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Which backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Hosted,
    Local,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Hosted => f.write_str("hosted"),
            ProviderKind::Local => f.write_str("local"),
        }
    }
}

/// Construct the selected backend. Hosted requires `OPENAI_API_KEY`.
pub fn build_classifier(
    kind: ProviderKind,
    ollama_host: &str,
) -> Result<Box<dyn Classifier>, ScanError> {
    info!(provider = %kind, "Selecting classification provider");
    match kind {
        ProviderKind::Hosted => Ok(Box::new(OpenAiClient::new_from_env()?)),
        ProviderKind::Local => Ok(Box::new(OllamaClient::new(ollama_host))),
    }
}

/// Validate a model reply and turn it into a [`ClassificationResult`].
pub fn parse_classification(text: &str) -> Result<ClassificationResult, ScanError> {
    let span = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(ScanError::Parse("no JSON object found in response".to_string())),
    };
    let value: Value = serde_json::from_str(span)?;
    let obj = value
        .as_object()
        .ok_or_else(|| ScanError::Parse("response JSON is not an object".to_string()))?;

    let dominant = match obj.get("dominant") {
        Some(Value::String(s)) => Quadrant::from_key(s.trim())
            .ok_or_else(|| ScanError::Parse(format!("unknown dominant quadrant '{s}'")))?,
        Some(other) => {
            return Err(ScanError::Parse(format!(
                "'dominant' must be a string, got {other}"
            )))
        }
        None => return Err(ScanError::Parse("missing key 'dominant'".to_string())),
    };

    Ok(ClassificationResult {
        dominant,
        tutorial: percentage(obj, "tutorial")?,
        how_to: percentage(obj, "how_to")?,
        explanation: percentage(obj, "explanation")?,
        reference: percentage(obj, "reference")?,
    })
}

fn percentage(obj: &Map<String, Value>, key: &str) -> Result<u8, ScanError> {
    let n = match obj.get(key) {
        Some(Value::Number(n)) => n,
        Some(other) => {
            return Err(ScanError::Parse(format!(
                "'{key}' must be a number, got {other}"
            )))
        }
        None => return Err(ScanError::Parse(format!("missing key '{key}'"))),
    };
    let whole = match (n.as_u64(), n.as_f64()) {
        (Some(v), _) => Some(v),
        (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 => Some(f as u64),
        _ => None,
    };
    match whole {
        Some(v) if v <= 100 => Ok(v as u8),
        _ => Err(ScanError::Parse(format!(
            "'{key}' must be an integer between 0 and 100, got {n}"
        ))),
    }
}

static RATE_LIMIT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Please try again in ([\d.]+)(ms|s)").expect("valid regex literal")
});

/// Wait hinted by an OpenAI rate-limit message ("Please try again in 1.5s" / "in 200ms").
pub fn rate_limit_hint(message: &str) -> Option<Duration> {
    let caps = RATE_LIMIT_HINT.captures(message)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2)?.as_str() {
        "ms" => Some(Duration::from_micros((amount * 1000.0).round() as u64)),
        _ => Some(Duration::from_millis((amount * 1000.0).round() as u64)),
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// OpenAI chat-completions backend.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: MAX_RATE_LIMIT_RETRIES,
        }
    }

    /// Read `OPENAI_API_KEY` (required) and `OPENAI_BASE_URL` (optional).
    pub fn new_from_env() -> Result<Self, ScanError> {
        let api_key = match env::var(OPENAI_API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                error!("{OPENAI_API_KEY_VAR} missing in environment");
                return Err(ScanError::Auth(format!(
                    "{OPENAI_API_KEY_VAR} must be set to use the hosted provider"
                )));
            }
        };
        let base_url = env::var(OPENAI_BASE_URL_VAR)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        info!(base_url = %base_url, "Initialized OpenAI client from environment");
        Ok(Self::new(api_key, base_url))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[async_trait]
impl Classifier for OpenAiClient {
    fn default_model(&self) -> &'static str {
        DEFAULT_OPENAI_MODEL
    }

    async fn classify(
        &self,
        prompt: &str,
        model: &str,
        options: &ClassifyOptions,
    ) -> Result<ClassificationResult, ScanError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = options.temperature {
            body["temperature"] = json!(t);
        }

        let mut retries = 0;
        loop {
            debug!(url = %url, model, attempt = retries + 1, "Sending chat completion request");
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let text = resp.text().await.unwrap_or_default();
                if retries >= self.max_retries {
                    error!(retries, "Rate limit retries exhausted");
                    return Err(ScanError::Network(format!(
                        "rate limited after {retries} retries: {text}"
                    )));
                }
                let wait = rate_limit_hint(&text).unwrap_or(DEFAULT_RETRY_DELAY);
                warn!(wait_ms = wait.as_millis() as u64, retries, "Rate limited, backing off");
                tokio::time::sleep(wait).await;
                retries += 1;
                continue;
            }

            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                error!(%status, "OpenAI request failed");
                return Err(ScanError::Network(format!("HTTP {status}: {text}")));
            }

            let completion: ChatCompletionResponse = resp
                .json()
                .await
                .map_err(|e| ScanError::Parse(format!("unexpected completion body: {e}")))?;
            let content = completion
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| ScanError::Parse("completion has no message content".to_string()))?;
            return parse_classification(&content);
        }
    }
}

/// Ollama chat backend. No credential; just a host.
pub struct OllamaClient {
    http: reqwest::Client,
    host: String,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        info!(host = %host, "Initialized Ollama client");
        Self {
            http: reqwest::Client::new(),
            host,
        }
    }
}

#[async_trait]
impl Classifier for OllamaClient {
    fn default_model(&self) -> &'static str {
        DEFAULT_OLLAMA_MODEL
    }

    async fn classify(
        &self,
        prompt: &str,
        model: &str,
        options: &ClassifyOptions,
    ) -> Result<ClassificationResult, ScanError> {
        let url = format!("{}/api/chat", self.host);
        let mut body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "stream": false,
        });
        if let Some(t) = options.temperature {
            body["options"] = json!({ "temperature": t });
        }

        debug!(url = %url, model, "Sending Ollama chat request");
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!(%status, "Ollama request failed");
            return Err(ScanError::Network(format!("HTTP {status}: {text}")));
        }
        let chat: OllamaChatResponse = resp
            .json()
            .await
            .map_err(|e| ScanError::Parse(format!("unexpected Ollama body: {e}")))?;
        let content = chat
            .message
            .content
            .ok_or_else(|| ScanError::Parse("Ollama reply has no message content".to_string()))?;
        parse_classification(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_reply() {
        let result = parse_classification(
            r#"{"dominant":"how_to","tutorial":10,"how_to":80,"explanation":0,"reference":10}"#,
        )
        .unwrap();
        assert_eq!(result.dominant, Quadrant::HowTo);
        assert_eq!(result.how_to, 80);
        assert_eq!(result.reference, 10);
    }

    #[test]
    fn extracts_json_wrapped_in_prose_and_fences() {
        let reply = "Sure! Here you go:\n```json\n{\"dominant\": \"reference\", \"tutorial\": 0, \"how_to\": 5, \"explanation\": 15, \"reference\": 90}\n```\nHope that helps.";
        let result = parse_classification(reply).unwrap();
        assert_eq!(result.dominant, Quadrant::Reference);
    }

    #[test]
    fn sum_is_not_required_to_be_100() {
        let result = parse_classification(
            r#"{"dominant":"tutorial","tutorial":90,"how_to":70,"explanation":40,"reference":20}"#,
        )
        .unwrap();
        assert_eq!(result.tutorial, 90);
    }

    #[test]
    fn rejects_invalid_replies() {
        let cases = [
            ("not json at all", "no object"),
            (r#"{"dominant":"how_to"}"#, "missing percentages"),
            (
                r#"{"dominant":"How-To","tutorial":1,"how_to":1,"explanation":1,"reference":1}"#,
                "wrong dominant spelling",
            ),
            (
                r#"{"dominant":"tutorial","tutorial":"80","how_to":1,"explanation":1,"reference":1}"#,
                "string percentage",
            ),
            (
                r#"{"dominant":"tutorial","tutorial":101,"how_to":1,"explanation":1,"reference":1}"#,
                "out of range",
            ),
            (
                r#"{"dominant":"tutorial","tutorial":-1,"how_to":1,"explanation":1,"reference":1}"#,
                "negative",
            ),
            (
                r#"{"dominant":"tutorial","tutorial":12.5,"how_to":1,"explanation":1,"reference":1}"#,
                "fractional",
            ),
            ("{ broken json }", "malformed"),
        ];
        for (reply, name) in cases {
            assert!(
                matches!(parse_classification(reply), Err(ScanError::Parse(_))),
                "{name}: expected parse error"
            );
        }
    }

    #[test]
    fn reserialized_result_matches_input() {
        let input = r#"{"dominant":"how_to","tutorial":10,"how_to":80,"explanation":0,"reference":10}"#;
        let result = parse_classification(input).unwrap();
        assert_eq!(serde_json::to_string(&result).unwrap(), input);
    }

    #[test]
    fn rate_limit_hint_reads_seconds_and_millis() {
        assert_eq!(
            rate_limit_hint("Rate limit reached. Please try again in 1.5s. Visit ..."),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            rate_limit_hint("Please try again in 200ms."),
            Some(Duration::from_millis(200))
        );
        assert_eq!(rate_limit_hint("slow down"), None);
    }
}
