//! Vision answer engine
//!
//! Sends the current frame and the user's question to an OpenAI-compatible
//! vision chat model. Never fails outward: every failure maps to a short
//! apology that is spoken in place of an answer.

use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{Frame, SessionTranscript};
use crate::session::AnswerEngine;

/// Default chat completions endpoint
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default vision model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default answer length cap
pub const DEFAULT_MAX_TOKENS: u32 = 300;

const SYSTEM_PROMPT: &str = "You are an advanced vision assistant that can:
1. Read and interpret text in images (OCR)
2. Count objects and perform calculations
3. Identify people, clothing, and objects
4. Analyze scenes and describe environments
5. Perform logical reasoning about visual information

Provide direct, concise answers based on what you see in the image.
If you cannot determine something with confidence, acknowledge that limitation.";

/// Why an answer could not be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerFailure {
    /// No API key configured
    NotConfigured,
    /// The configured model does not exist for this account
    ModelNotFound,
    /// Billing or quota limits reached
    AccountLimits,
    /// Any other API error response
    Api(u16),
    /// Request never completed or response was unreadable
    Transport(String),
}

impl AnswerFailure {
    /// Spoken replacement for the missing answer
    #[must_use]
    pub const fn apology(&self) -> &'static str {
        match self {
            Self::NotConfigured => "Sorry, I'm not properly configured to analyze images.",
            Self::ModelNotFound => {
                "Sorry, there was an issue with the vision processing service. The current model is unavailable."
            }
            Self::AccountLimits => {
                "Sorry, the vision service is currently unavailable due to account limits."
            }
            Self::Api(_) => "Sorry, I encountered an error while analyzing the image.",
            Self::Transport(_) => "Sorry, I couldn't process the image due to a technical error.",
        }
    }
}

impl std::fmt::Display for AnswerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "API key not configured"),
            Self::ModelNotFound => write!(f, "model not found"),
            Self::AccountLimits => write!(f, "billing or quota limit"),
            Self::Api(status) => write!(f, "API error {status}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

/// A chat message (plain text or multi-part)
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(String),
    Parts(Vec<ContentPart<'a>>),
}

/// Content part (text or image)
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

/// Answers questions about the live camera frame
pub struct VisionAnswerEngine {
    client: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    model: String,
    max_tokens: u32,
    transcript: Option<Arc<SessionTranscript>>,
    runtime: tokio::runtime::Handle,
}

impl VisionAnswerEngine {
    /// Create an engine; a missing key yields apology answers
    #[must_use]
    pub fn new(api_key: Option<String>, runtime: tokio::runtime::Handle) -> Self {
        if api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set, vision answers unavailable");
        }

        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.is_empty()),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            transcript: None,
            runtime,
        }
    }

    /// Use a specific model
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Use a different OpenAI-compatible endpoint
    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    /// Cap the answer length
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Include session history in the system prompt
    #[must_use]
    pub fn with_transcript(mut self, transcript: Arc<SessionTranscript>) -> Self {
        self.transcript = Some(transcript);
        self
    }

    async fn request_answer(
        &self,
        frame: &Frame,
        question: &str,
    ) -> std::result::Result<String, AnswerFailure> {
        let api_key = self.api_key.as_deref().ok_or(AnswerFailure::NotConfigured)?;

        let jpeg = frame
            .to_jpeg()
            .map_err(|e| AnswerFailure::Transport(e.to_string()))?;
        let image_url = format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(jpeg)
        );

        let history = self
            .transcript
            .as_ref()
            .map(|t| t.context())
            .unwrap_or_default();
        if !history.is_empty() {
            tracing::debug!(chars = history.len(), "session history included in prompt");
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(build_system_prompt(&history)),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text: question },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: image_url },
                        },
                    ]),
                },
            ],
            max_tokens: self.max_tokens,
        };

        tracing::info!(model = %self.model, "sending request to vision API");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnswerFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "vision API error");
            return Err(classify_api_error(status.as_u16(), &body));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnswerFailure::Transport(format!("parse error: {e}")))?;

        Ok(result
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

impl AnswerEngine for VisionAnswerEngine {
    fn answer(&self, frame: &Frame, question: &str) -> String {
        tracing::info!(question, "processing question with image");

        match self.runtime.block_on(self.request_answer(frame, question)) {
            Ok(answer) => {
                tracing::info!(answer_len = answer.len(), "question answered");
                answer
            }
            Err(failure) => {
                tracing::error!(error = %failure, "vision answer failed");
                failure.apology().to_string()
            }
        }
    }
}

/// System prompt with optional session history appended
fn build_system_prompt(history: &str) -> String {
    if history.trim().is_empty() {
        SYSTEM_PROMPT.to_string()
    } else {
        format!(
            "{SYSTEM_PROMPT}\n\nHere is the conversation history from this session that you can use for context:\n{history}"
        )
    }
}

/// Map an API error response onto a failure kind
fn classify_api_error(status: u16, body: &str) -> AnswerFailure {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_default();

    if detail
        .code
        .as_deref()
        .is_some_and(|code| code.contains("model_not_found"))
    {
        return AnswerFailure::ModelNotFound;
    }

    let message = detail.message.unwrap_or_default().to_lowercase();
    if message.contains("billing") || message.contains("quota") {
        return AnswerFailure::AccountLimits;
    }

    AnswerFailure::Api(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_model_not_found() {
        let body = r#"{"error":{"message":"The model does not exist","code":"model_not_found"}}"#;
        assert_eq!(classify_api_error(404, body), AnswerFailure::ModelNotFound);
    }

    #[test]
    fn test_classify_quota() {
        let body = r#"{"error":{"message":"You exceeded your current quota","code":"insufficient_quota"}}"#;
        assert_eq!(classify_api_error(429, body), AnswerFailure::AccountLimits);
    }

    #[test]
    fn test_classify_unparseable_body() {
        assert_eq!(classify_api_error(500, "<html>"), AnswerFailure::Api(500));
    }

    #[test]
    fn test_system_prompt_includes_history() {
        assert_eq!(build_system_prompt("  "), SYSTEM_PROMPT);

        let prompt = build_system_prompt("[10:00:00] Question: hi\n");
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.contains("conversation history"));
        assert!(prompt.ends_with("Question: hi\n"));
    }

    #[test]
    fn test_missing_key_answers_with_apology() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let engine = VisionAnswerEngine::new(None, runtime.handle().clone());
        let frame = Frame::solid(8, 8, [0, 0, 0]);

        let answer = std::thread::spawn(move || engine.answer(&frame, "what is this"))
            .join()
            .unwrap();

        assert_eq!(answer, AnswerFailure::NotConfigured.apology());
    }

    #[test]
    fn test_request_serializes_multipart_content() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text { text: "count" },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/jpeg;base64,AAAA".to_string(),
                        },
                    },
                ]),
            }],
            max_tokens: 300,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }
}
