//! Client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::error::ServiceError;

/// One piece of a multimodal prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn image(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Part::Image {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// A hosted model that answers a multimodal prompt with free text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, parts: Vec<Part>) -> Result<String, ServiceError>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

impl From<Part> for RequestPart {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(text) => RequestPart::Text { text },
            Part::Image { mime_type, data } => RequestPart::InlineData {
                inline_data: InlineData {
                    mime_type,
                    data: general_purpose::STANDARD.encode(data),
                },
            },
        }
    }
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

fn build_request(parts: Vec<Part>) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: parts.into_iter().map(RequestPart::from).collect(),
        }],
    }
}

fn parse_response(body: &str) -> Result<String, ServiceError> {
    let response: GenerateContentResponse = serde_json::from_str(body)?;
    response.into_text().ok_or(ServiceError::EmptyResponse)
}

/// Shared handle to the Gemini REST API. Build once and pass around behind an `Arc`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint_url(&config.base_url, &config.model),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

fn endpoint_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn generate(&self, parts: Vec<Part>) -> Result<String, ServiceError> {
        let payload = build_request(parts);

        tracing::debug!("📤 Sending request to Gemini ({})...", self.model);

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "Gemini response"
        );

        if !status.is_success() {
            return Err(ServiceError::from_status(status.as_u16(), body));
        }

        parse_response(&body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_matches_wire_format() {
        let request = build_request(vec![
            Part::text("Is this a sandwich?"),
            Part::image("image/png", vec![1u8, 2, 3]),
        ]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{
                    "parts": [
                        { "text": "Is this a sandwich?" },
                        { "inline_data": { "mime_type": "image/png", "data": "AQID" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "  Yes" }, { "text": ", a club sandwich.\n" } ], "role": "model" } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ],
            "usageMetadata": { "totalTokenCount": 12 }
        }"#;
        assert_eq!(parse_response(body).unwrap(), "Yes, a club sandwich.");
    }

    #[test]
    fn blocked_or_empty_replies_are_errors() {
        assert!(matches!(
            parse_response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            Err(ServiceError::EmptyResponse)
        ));
        assert!(matches!(
            parse_response(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#),
            Err(ServiceError::EmptyResponse)
        ));
        assert!(matches!(
            parse_response("not json"),
            Err(ServiceError::Decode(_))
        ));
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        assert_eq!(
            endpoint_url("https://example.test/v1beta/", "gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
