use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::schema::{parse_model_text, response_schema, ResponseValidator, EXTRACTION_PROMPT};
use super::{ExtractionError, Extractor};
use crate::config::ExtractorConfig;
use crate::models::{ExtractionResult, UploadedFile};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Google Gemini `generateContent` client with overload backoff.
pub struct GeminiExtractor {
    client: Client,
    config: ExtractorConfig,
    validator: ResponseValidator,
}

impl GeminiExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            validator: ResponseValidator::new()?,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(file: &UploadedFile) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: file.mime_type.clone(),
                            data: STANDARD.encode(&file.bytes),
                        },
                    },
                    Part::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
            },
        }
    }

    async fn call_once(&self, api_key: &str, request: &GenerateRequest) -> Result<String, ExtractionError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyResponse);
        }
        Ok(text)
    }

    fn parse(&self, raw: &str) -> Result<ExtractionResult, ExtractionError> {
        let value = parse_model_text(raw)?;
        self.validator.validate(&value)?;
        serde_json::from_value(value).map_err(|e| ExtractionError::Schema(e.to_string()))
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, file: &UploadedFile) -> Result<ExtractionResult, ExtractionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ExtractionError::MissingApiKey)?;

        let request = Self::build_request(file);
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = Duration::from_millis(self.config.initial_backoff_ms);

        info!(
            file = %file.file_name,
            model = %self.config.model,
            bytes = file.bytes.len(),
            "Sending document to Gemini"
        );

        let mut attempt = 1;
        loop {
            match self.call_once(api_key, &request).await {
                Ok(raw) => {
                    debug!(file = %file.file_name, attempt, "Gemini responded");
                    return self.parse(&raw);
                }
                Err(err) if is_overload(&err) => {
                    if attempt >= max_attempts {
                        return Err(ExtractionError::Overloaded {
                            attempts: max_attempts,
                        });
                    }
                    warn!(
                        file = %file.file_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Gemini overloaded, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// 503/429, or an error body that says so.
fn is_overload(err: &ExtractionError) -> bool {
    match err {
        ExtractionError::Http { status, body } => {
            *status == StatusCode::SERVICE_UNAVAILABLE.as_u16()
                || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                || body.to_lowercase().contains("overloaded")
        }
        _ => false,
    }
}
