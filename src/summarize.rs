//! One round-trip to the chat-completions API, turning extracted text into a
//! summary, flashcards and a quiz.

use std::time::Instant;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{config::Config, error::AppError, models::SummaryResult};

const TEMPERATURE: f32 = 0.5;
const PARSE_FAILURE: &str = "Failed to parse OpenAI response";

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Prompt ───────────────────────────────────────────────────────────────────

/// The fixed instruction wrapped around `content`, which is embedded verbatim.
pub fn build_prompt(content: &str) -> String {
    format!(
        r#"Summarize this article and generate 5 flashcards and a quiz.
---
{content}
---
Respond with a single JSON object and nothing else, in exactly this format:
{{
    "summary": "...",
    "flashcards": [{{"question": "...", "answer": "..."}}],
    "quiz": [{{"question": "...", "options": ["...", "..."], "answer": "..."}}]
}}"#
    )
}

// ── Gateway ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Gateway {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl Gateway {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let http_client = reqwest::ClientBuilder::new()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(config.llm_timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model: config.openai_model.clone(),
        })
    }

    pub fn chat_request(&self, content: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(build_prompt(content))],
            temperature: TEMPERATURE,
        }
    }

    /// Either a well-formed result or `SummarizationFailed`; never retried.
    pub async fn summarize(&self, content: &str) -> Result<SummaryResult, AppError> {
        let reply = self.complete(self.chat_request(content)).await?;
        parse_reply(&reply)
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, AppError> {
        let start = Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                if e.is_timeout() {
                    AppError::summarization("OpenAI request timed out", None)
                } else {
                    AppError::summarization("OpenAI request failed", None)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "OpenAI API error");
            return Err(AppError::summarization(
                format!("OpenAI API error (status {})", status.as_u16()),
                Some(error_text),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::summarization(format!("Failed to read OpenAI response: {}", e), None))?;

        let chat_response: ChatResponseRaw = serde_json::from_str(&body)
            .map_err(|_| AppError::summarization("Unexpected OpenAI response", Some(body.clone())))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::summarization("No response from OpenAI", Some(body)))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "OpenAI chat completion"
        );

        Ok(content)
    }
}

/// Strictly parse the model's reply. Extra or missing keys are failures.
pub fn parse_reply(reply: &str) -> Result<SummaryResult, AppError> {
    let body = strip_code_fence(reply.trim());
    serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "reply did not match summary schema");
        AppError::summarization(PARSE_FAILURE, Some(reply.to_string()))
    })
}

fn strip_code_fence(reply: &str) -> &str {
    let Some(rest) = reply.strip_prefix("```") else {
        return reply;
    };
    // drop the info string (```json)
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;
    use crate::models::{Flashcard, QuizQuestion};

    const GOOD_REPLY: &str = r#"{
        "summary": "Plants turn light into sugar.",
        "flashcards": [{"question": "What do plants make?", "answer": "Sugar"}],
        "quiz": [{"question": "Energy source?", "options": ["Light", "Sound"], "answer": "Light"}]
    }"#;

    fn completion(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        })
        .to_string()
    }

    fn gateway(base: &str) -> Gateway {
        Gateway::new(&Config::for_tests(base)).unwrap()
    }

    #[test]
    fn prompt_embeds_content_verbatim() {
        let content = "Line one\n  \"quoted\" {braces} \\ back\u{2014}slash";
        let request = gateway("http://127.0.0.1:9").chat_request(content);

        let body = serde_json::to_value(&request).unwrap();
        let sent = body["messages"][0]["content"].as_str().unwrap();
        assert!(sent.contains(content));
        assert_eq!(body["temperature"], json!(0.5));
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn parses_conforming_reply() {
        let result = parse_reply(GOOD_REPLY).unwrap();
        assert_eq!(result.summary, "Plants turn light into sugar.");
        assert_eq!(
            result.flashcards,
            vec![Flashcard { question: "What do plants make?".into(), answer: "Sugar".into() }]
        );
        assert_eq!(
            result.quiz,
            vec![QuizQuestion {
                question: "Energy source?".into(),
                options: vec!["Light".into(), "Sound".into()],
                answer: "Light".into(),
            }]
        );
    }

    #[test]
    fn accepts_fenced_reply() {
        let fenced = format!("```json\n{}\n```", GOOD_REPLY);
        assert!(parse_reply(&fenced).is_ok());
    }

    #[test]
    fn invalid_json_keeps_raw_reply() {
        let reply = "Sure! Here is your summary: plants are neat.";
        match parse_reply(reply) {
            Err(AppError::SummarizationFailed { reason, raw }) => {
                assert_eq!(reason, PARSE_FAILURE);
                assert_eq!(raw.as_deref(), Some(reply));
            }
            other => panic!("expected SummarizationFailed, got {:?}", other),
        }
    }

    #[test]
    fn schema_deviations_are_failures() {
        let cases = [
            r#"{"summary": "s", "flashcards": []}"#,
            r#"{"summary": "s", "flashcards": [], "quiz": [], "extra": 1}"#,
            r#"{"summary": "s", "flashcards": [{"question": "q"}], "quiz": []}"#,
            r#"{"summary": "s", "flashcards": [], "quiz": [{"question": "q", "options": "a,b", "answer": "a"}]}"#,
            r#"["summary"]"#,
        ];
        for case in cases {
            assert!(
                matches!(parse_reply(case), Err(AppError::SummarizationFailed { .. })),
                "{}",
                case
            );
        }
    }

    #[tokio::test]
    async fn sends_prompt_and_parses_reply() {
        let content = "Photosynthesis converts light into chemical energy.";
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"model": "gpt-4", "temperature": 0.5})),
                Matcher::Regex(regex::escape(content)),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion(GOOD_REPLY))
            .create_async()
            .await;

        let result = gateway(&server.url()).summarize(content).await.unwrap();
        assert_eq!(result.flashcards.len(), 1);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn unparseable_model_reply_is_typed_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(completion("I cannot do that."))
            .create_async()
            .await;

        let err = gateway(&server.url()).summarize("x").await.unwrap_err();
        match err {
            AppError::SummarizationFailed { raw, .. } => {
                assert_eq!(raw.as_deref(), Some("I cannot do that."))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let base = crate::test_support::silent_upstream().await;
        let mut config = Config::for_tests(&base);
        config.llm_timeout = std::time::Duration::from_millis(300);

        let err = Gateway::new(&config).unwrap().summarize("x").await.unwrap_err();
        match err {
            AppError::SummarizationFailed { reason, raw } => {
                assert_eq!(reason, "OpenAI request timed out");
                assert_eq!(raw, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn provider_error_status_is_typed_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error": {"message": "rate limited"}}"#)
            .create_async()
            .await;

        let err = gateway(&server.url()).summarize("x").await.unwrap_err();
        assert!(matches!(err, AppError::SummarizationFailed { .. }));
        assert!(err.to_string().contains("429"));
    }
}
