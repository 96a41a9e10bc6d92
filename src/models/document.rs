use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ExtractionResult;

/// Processing status of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Success,
    Error,
}

/// A file handed over by the browser, already read into memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Uploaded DARF and everything known about its extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub result: Option<ExtractionResult>,
    pub calculated_total: Option<BigDecimal>,
    pub error_message: Option<String>,
}

impl Document {
    pub fn pending(file: &UploadedFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            uploaded_at: Utc::now(),
            status: DocumentStatus::Pending,
            result: None,
            calculated_total: None,
            error_message: None,
        }
    }

    /// Success or Error: nothing else will happen to this document.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, DocumentStatus::Success | DocumentStatus::Error)
    }
}

/// PDF or any image type.
pub fn is_document_mime(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    mime == "application/pdf" || mime.starts_with("image/")
}
