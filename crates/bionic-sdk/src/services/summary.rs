//! LLM summarization over an OpenAI-compatible chat completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::openai::OpenAiClient;
use super::Summarizer;
use crate::config::{ConfigValidationError, SummaryConfig};
use crate::{SDKError, SDKResult};

const SERVICE: &str = "summarizer";

/// Prefixes models like to echo back before the summary itself.
const ECHOED_PREFIXES: [&str; 6] = ["Summary:", "摘要：", "摘要:", "总结：", "总结:", "summary:"];

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Summarizer backed by a chat model.
pub struct ApiSummarizer {
    client: OpenAiClient,
    model: String,
    timeout: Duration,
    temperature: f32,
    top_p: f32,
}

impl ApiSummarizer {
    pub fn new(client: OpenAiClient, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
            temperature: 0.3,
            top_p: 0.8,
        }
    }

    pub fn from_config(config: &SummaryConfig) -> SDKResult<Self> {
        let (Some(base_url), Some(model)) = (config.base_url.clone(), config.model.clone()) else {
            return Err(ConfigValidationError::MissingEndpoint(SERVICE.into()).into());
        };
        info!(model = %model, "Using API summary service");
        let mut summarizer = Self::new(
            OpenAiClient::new(SERVICE, base_url, config.api_key.clone()),
            model,
            Duration::from_secs(config.timeout_secs),
        );
        summarizer.temperature = config.temperature;
        summarizer.top_p = config.top_p;
        Ok(summarizer)
    }

    async fn request_summary(&self, text: &str, max_length: usize) -> SDKResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(text, max_length),
            }],
            max_tokens: max_length,
            temperature: self.temperature,
            top_p: self.top_p,
        };
        let response: ChatResponse = self
            .client
            .post_json("chat/completions", &request, self.timeout)
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SDKError::malformed(SERVICE, "no choices in response"))?;
        Ok(clean_summary(&content))
    }
}

#[async_trait]
impl Summarizer for ApiSummarizer {
    async fn generate_summary(&self, text: &str, max_length: usize) -> SDKResult<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        if text.chars().count() <= max_length {
            return Ok(text.to_string());
        }

        match self.request_summary(text, max_length).await {
            Ok(summary) => {
                info!(
                    from_chars = text.chars().count(),
                    to_chars = summary.chars().count(),
                    "Summary generated"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "Summary generation failed, truncating instead");
                Ok(fallback_summary(text, max_length))
            }
        }
    }
}

fn build_prompt(text: &str, max_length: usize) -> String {
    format!(
        "Write a concise summary of the content below.\n\
         \n\
         1. Keep it within {max_length} characters\n\
         2. Keep the core facts and key points\n\
         3. Use plain, direct language\n\
         4. Stay complete and accurate\n\
         \n\
         Content:\n{text}\n\
         \n\
         Summary:"
    )
}

/// Strip whitespace, echoed prefixes and wrapping quotes from model output.
pub fn clean_summary(raw: &str) -> String {
    let mut summary = raw.trim().to_string();
    for prefix in ECHOED_PREFIXES {
        summary = summary.replace(prefix, "");
    }
    let mut summary = summary.trim();

    for quote in ['"', '\''] {
        if summary.len() >= 2 && summary.starts_with(quote) && summary.ends_with(quote) {
            summary = &summary[1..summary.len() - 1];
        }
    }
    summary.trim().to_string()
}

/// Cut to `max_length` characters, preferring a sentence end in the last fifth.
pub fn fallback_summary(text: &str, max_length: usize) -> String {
    let total = text.chars().count();
    let mut summary: String = text.chars().take(max_length).collect();

    let last_stop = summary
        .char_indices()
        .filter(|(_, c)| matches!(c, '。' | '.'))
        .map(|(byte, c)| (summary[..byte].chars().count(), byte + c.len_utf8()))
        .last();
    if let Some((char_pos, end_byte)) = last_stop {
        if char_pos as f64 > max_length as f64 * 0.8 {
            summary.truncate(end_byte);
        }
    }

    if total > max_length {
        summary.push_str("...");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::openai::test_server;
    use axum::routing::post;
    use axum::{http::StatusCode, Json, Router};
    use serde_json::{json, Value};

    #[test]
    fn test_clean_summary() {
        assert_eq!(clean_summary("  Summary: hiking trip  "), "hiking trip");
        assert_eq!(clean_summary("摘要：用户喜欢徒步"), "用户喜欢徒步");
        assert_eq!(clean_summary("\"quoted\""), "quoted");
        assert_eq!(clean_summary("'single'"), "single");
        assert_eq!(clean_summary("\""), "\"");
    }

    #[test]
    fn test_fallback_prefers_late_sentence_end() {
        // Stop at char 9 of 11: past 80%, so the trailing space goes
        let text = "abcdefghi. tail continues here";
        assert_eq!(fallback_summary(text, 11), "abcdefghi....");
    }

    #[test]
    fn test_fallback_ignores_early_sentence_end() {
        let text = "ab. cdefghijklmnop";
        assert_eq!(fallback_summary(text, 10), "ab. cdefgh...");
    }

    #[test]
    fn test_fallback_counts_characters() {
        let text = "我喜欢在周末去山里徒步。然后回家";
        let summary = fallback_summary(text, 12);
        assert_eq!(summary, "我喜欢在周末去山里徒步。...");
    }

    #[test]
    fn test_fallback_short_text_untouched() {
        assert_eq!(fallback_summary("short", 10), "short");
    }

    fn summarizer(base: String) -> ApiSummarizer {
        ApiSummarizer::from_config(&SummaryConfig {
            enabled: true,
            base_url: Some(base),
            model: Some("test-model".into()),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_summary_cleans_output() {
        let router = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["max_tokens"], 8);
                Json(json!({"choices": [{"message": {"role": "assistant", "content": " Summary: \"short\" "}}]}))
            }),
        );
        let summarizer = summarizer(test_server::spawn(router).await);
        let summary = summarizer
            .generate_summary("this text is longer than eight", 8)
            .await
            .unwrap();
        assert_eq!(summary, "short");
    }

    #[tokio::test]
    async fn test_generate_summary_falls_back_on_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let summarizer = summarizer(test_server::spawn(router).await);
        let summary = summarizer.generate_summary("0123456789abc", 10).await.unwrap();
        assert_eq!(summary, "0123456789...");
    }

    #[tokio::test]
    async fn test_short_text_skips_request() {
        // Unroutable base URL: any request would fail
        let summarizer = summarizer("http://127.0.0.1:9".into());
        assert_eq!(summarizer.generate_summary("tiny", 10).await.unwrap(), "tiny");
    }
}
