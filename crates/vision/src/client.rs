use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fatura_core::VisionSection;

use crate::encode::jpeg_data_url;
use crate::prompt::{SYSTEM_PROMPT, USER_PROMPT};
use crate::VisionError;

/// What a vision backend returned for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionReply {
    /// Message text, trimmed.
    pub content: String,
    pub tokens_used: Option<u64>,
}

/// A model that turns a base64 JPEG bill image into a text reply.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, image_base64: &str) -> Result<VisionReply, VisionError>;
}

#[async_trait]
impl<T: VisionBackend + ?Sized> VisionBackend for Box<T> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn complete(&self, image_base64: &str) -> Result<VisionReply, VisionError> {
        (**self).complete(image_base64).await
    }
}

// ── Wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

impl ChatResponse {
    fn into_reply(self) -> Result<VisionReply, VisionError> {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(VisionError::EmptyResponse)?;
        Ok(VisionReply {
            content: content.trim().to_string(),
            tokens_used: self.usage.map(|u| u.total_tokens),
        })
    }
}

// ── OpenAI-compatible client ─────────────────────────────────────────────────

/// Client for any `/chat/completions` endpoint that accepts image content parts.
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatCompletionsClient {
    pub fn from_section(section: &VisionSection) -> Result<Self, VisionError> {
        let api_key = section
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(VisionError::MissingApiKey)?;
        let client = Client::builder().timeout(Duration::from_secs(section.timeout_secs)).build()?;
        Ok(Self {
            client,
            base_url: section.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: section.model.clone(),
            max_tokens: section.max_tokens,
            temperature: section.temperature,
        })
    }

    fn request(&self, image_url: String) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: MessageContent::Text(SYSTEM_PROMPT) },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text: USER_PROMPT },
                        ContentPart::ImageUrl { image_url: ImageUrl { url: image_url, detail: "high" } },
                    ]),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl VisionBackend for ChatCompletionsClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, image_base64: &str) -> Result<VisionReply, VisionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.request(jpeg_data_url(image_base64));
        debug!(model = %self.model, url = %url, "Sending bill image to vision model");

        let response = self.client.post(&url).bearer_auth(&self.api_key).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Api { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.into_reply()
    }
}

// ── Mock backend (tests) ─────────────────────────────────────────────────────

/// Replies with a fixed string and records the images it was given.
pub struct MockVisionBackend {
    model: String,
    reply: Result<VisionReply, String>,
    seen: Mutex<Vec<String>>,
}

impl MockVisionBackend {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            model: "mock-vision".into(),
            reply: Ok(VisionReply { content: content.into(), tokens_used: Some(42) }),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with an API error carrying `body`.
    pub fn failing(body: impl Into<String>) -> Self {
        Self { reply: Err(body.into()), ..Self::new("") }
    }

    /// Number of images sent so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl VisionBackend for MockVisionBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, image_base64: &str) -> Result<VisionReply, VisionError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(image_base64.to_string());
        }
        self.reply
            .clone()
            .map_err(|body| VisionError::Api { status: 500, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(key: Option<&str>) -> VisionSection {
        VisionSection { api_key: key.map(String::from), ..Default::default() }
    }

    #[test]
    fn client_requires_api_key() {
        assert!(matches!(
            ChatCompletionsClient::from_section(&section(None)),
            Err(VisionError::MissingApiKey)
        ));
        assert!(matches!(
            ChatCompletionsClient::from_section(&section(Some(" "))),
            Err(VisionError::MissingApiKey)
        ));
    }

    #[test]
    fn request_carries_prompt_and_high_detail_image() {
        let client = ChatCompletionsClient::from_section(&section(Some("sk-test"))).unwrap();
        let json = serde_json::to_value(client.request(jpeg_data_url("QUJD"))).unwrap();

        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], SYSTEM_PROMPT);

        let parts = &json["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], USER_PROMPT);
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
        assert_eq!(parts[1]["image_url"]["detail"], "high");
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let mut s = section(Some("sk-test"));
        s.base_url = "http://localhost:11434/v1/".into();
        let client = ChatCompletionsClient::from_section(&s).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn response_parsing_reads_content_and_usage() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  {\"dates\":[]}\n"}}],
                "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        )
        .unwrap();
        let reply = chat.into_reply().unwrap();
        assert_eq!(reply.content, r#"{"dates":[]}"#);
        assert_eq!(reply.tokens_used, Some(15));
    }

    #[test]
    fn response_without_choices_is_empty() {
        let chat: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(chat.into_reply(), Err(VisionError::EmptyResponse)));
    }

    #[tokio::test]
    async fn mock_records_calls() {
        let mock = MockVisionBackend::new("{}");
        assert_eq!(mock.complete("AAAA").await.unwrap().tokens_used, Some(42));
        assert_eq!(mock.calls(), 1);

        let failing = MockVisionBackend::failing("rate limited");
        assert!(matches!(
            failing.complete("AAAA").await,
            Err(VisionError::Api { status: 500, .. })
        ));
    }
}
