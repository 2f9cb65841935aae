//! OpenAI-compatible chat-completions client
//!
//! Implements [`TextGenerator`] (schema-constrained and free-text calls) and
//! [`SeedExtractor`] (vision call returning book seeds) over
//! `POST {base}/chat/completions`.
//!
//! Prompt blocks are sent as separate text parts of a single user message.

use crate::clients::http_client;
use crate::types::{GenerationError, OutputSchema, Seed, SeedExtractor, TextGenerator};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use shelf_common::config::GeneratorConfig;
use std::time::Duration;
use tracing::debug;

const EXTRACTION_PROMPT: &str = "\
Identify every book visible in this photo of a bookshelf or desk, reading spines and covers. \
For each book give the title, the authors, the ISBN if a barcode or number is legible, and your \
confidence between 0 and 1. Partial or uncertain readings are fine; use null for unknown fields.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionResult {
    #[serde(default)]
    extracted_seeds: Vec<Seed>,
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    config: GeneratorConfig,
}

impl OpenAiGenerator {
    /// # Arguments
    /// * `config` - Endpoint, model names and timeout
    /// * `api_key` - Bearer token for the endpoint
    pub fn new(config: GeneratorConfig, api_key: String) -> Result<Self, GenerationError> {
        let client = http_client(Duration::from_secs(config.timeout_secs))
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    async fn complete(&self, body: Value) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;
        first_content(chat)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate_structured(
        &self,
        schema: &OutputSchema,
        blocks: &[String],
    ) -> Result<Value, GenerationError> {
        debug!(model = %self.config.structured_model, schema = %schema.name, "Structured generation");
        let body = json!({
            "model": self.config.structured_model,
            "messages": [user_message(text_parts(blocks))],
            "response_format": response_format(schema),
        });

        let content = self.complete(body).await?;
        serde_json::from_str(&content).map_err(|e| GenerationError::Schema(e.to_string()))
    }

    async fn generate_text(&self, blocks: &[String]) -> Result<String, GenerationError> {
        debug!(model = %self.config.fallback_model, "Free-text generation");
        let body = json!({
            "model": self.config.fallback_model,
            "messages": [user_message(text_parts(blocks))],
        });
        self.complete(body).await
    }
}

#[async_trait]
impl SeedExtractor for OpenAiGenerator {
    async fn extract_seeds(&self, image: &[u8], mime: &str) -> Result<Vec<Seed>, GenerationError> {
        debug!(model = %self.config.vision_model, bytes = image.len(), mime, "Seed extraction");

        let mut parts = text_parts(&[EXTRACTION_PROMPT.to_string()]);
        parts.push(json!({
            "type": "image_url",
            "image_url": { "url": data_url(image, mime) },
        }));

        let body = json!({
            "model": self.config.vision_model,
            "messages": [user_message(parts)],
            "response_format": response_format(&extraction_schema()),
        });

        let content = self.complete(body).await?;
        let result: ExtractionResult =
            serde_json::from_str(&content).map_err(|e| GenerationError::Schema(e.to_string()))?;
        Ok(result.extracted_seeds)
    }
}

fn first_content(chat: ChatResponse) -> Result<String, GenerationError> {
    let message = chat
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or(GenerationError::EmptyResponse)?;

    if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
        return Err(GenerationError::Schema(format!("model refused: {}", refusal)));
    }
    message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)
}

fn text_parts(blocks: &[String]) -> Vec<Value> {
    blocks
        .iter()
        .map(|text| json!({ "type": "text", "text": text }))
        .collect()
}

fn user_message(parts: Vec<Value>) -> Value {
    json!({ "role": "user", "content": parts })
}

fn response_format(schema: &OutputSchema) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": schema.name,
            "schema": schema.schema,
            "strict": true,
        }
    })
}

fn data_url(image: &[u8], mime: &str) -> String {
    let mime = if mime.trim().is_empty() { "image/jpeg" } else { mime };
    format!("data:{};base64,{}", mime, BASE64.encode(image))
}

/// Output schema for the vision call
pub fn extraction_schema() -> OutputSchema {
    OutputSchema {
        name: "extracted_seeds".to_string(),
        schema: json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["extractedSeeds"],
            "properties": {
                "extractedSeeds": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["title", "authors", "isbn", "confidence"],
                        "properties": {
                            "title": { "type": ["string", "null"] },
                            "authors": { "type": ["array", "null"], "items": { "type": "string" } },
                            "isbn": { "type": ["string", "null"] },
                            "confidence": { "type": ["number", "null"] }
                        }
                    }
                }
            }
        }),
    }
}
