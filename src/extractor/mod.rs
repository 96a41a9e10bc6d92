//! Structured-data extraction from DARF files.
//!
//! The orchestrator only sees the [`Extractor`] trait; [`GeminiExtractor`]
//! is the production implementation.

pub mod gemini;
pub mod schema;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ExtractionResult, UploadedFile};

pub use gemini::GeminiExtractor;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("API key missing: set GEMINI_API_KEY or DARF__EXTRACTOR__API_KEY")]
    MissingApiKey,

    #[error("AI service overloaded after {attempts} attempts, try again later")]
    Overloaded { attempts: u32 },

    #[error("AI service error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI service returned an empty response")]
    EmptyResponse,

    #[error("unreadable response: {0}")]
    InvalidJson(String),

    #[error("response does not match the expected structure: {0}")]
    Schema(String),
}

/// One request per file; resolves to the extracted data or a descriptive error.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, file: &UploadedFile) -> Result<ExtractionResult, ExtractionError>;
}
