use axum::{
    extract::{Json, Multipart, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::clipboard::CapturedClipboard;
use crate::error::AppError;
use crate::models::{is_document_mime, CalculationMode, Document, PanelView, UploadedFile};
use crate::service::Reconciliation;

/// Document plus its reconciliation, once extracted
#[derive(Debug, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: Document,
    pub reconciliation: Option<Reconciliation>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub success: bool,
    pub count: usize,
    pub documents: Vec<DocumentView>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub removed: usize,
}

/// Panel plus the text the browser must put on the clipboard, if any
#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub panel: PanelView,
    pub clipboard_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: CalculationMode,
}

#[derive(Debug, Deserialize)]
pub struct WithholdingRequest {
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub has_withholding: bool,
}

/// Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// Accepts one or more DARF files (PDF or image) as multipart parts.
pub async fn upload_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
    {
        // plain form fields carry no file name
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !is_document_mime(&mime_type) {
            return Err(AppError::UnsupportedMediaType { file_name, mime_type });
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
        files.push(UploadedFile::new(file_name, mime_type, bytes.to_vec()));
    }

    let documents = state.orchestrator.submit(files).await?;
    info!(count = documents.len(), "Upload accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            success: true,
            message: format!("Processing {} documents", documents.len()),
            documents,
        }),
    ))
}

/// Most-recent-first list of every document
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let snapshot = state.orchestrator.snapshot();
    let documents: Vec<DocumentView> = snapshot
        .iter()
        .map(|doc| document_view(&state, doc.clone()))
        .collect();

    Json(DocumentListResponse {
        success: true,
        count: documents.len(),
        documents,
    })
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentView>, AppError> {
    let doc = find_document(&state, id)?;
    Ok(Json(document_view(&state, doc)))
}

pub async fn clear_documents(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    let removed = state.orchestrator.clear().await?;
    state.panels.clear();
    Ok(Json(ClearResponse {
        success: true,
        removed,
    }))
}

pub async fn get_panel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PanelView>, AppError> {
    let doc = find_document(&state, id)?;
    Ok(Json(state.panels.view(&doc, Instant::now())?))
}

pub async fn set_mode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ModeRequest>,
) -> Result<Json<PanelView>, AppError> {
    let doc = find_document(&state, id)?;
    Ok(Json(state.panels.set_mode(&doc, req.mode, Instant::now())?))
}

pub async fn set_withholding(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<WithholdingRequest>,
) -> Result<Json<PanelView>, AppError> {
    let doc = find_document(&state, id)?;
    Ok(Json(state.panels.set_withholding(&doc, &req.input, Instant::now())?))
}

pub async fn copy_final_value(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CopyResponse>, AppError> {
    let doc = find_document(&state, id)?;
    let clipboard = CapturedClipboard::new();
    let panel = state.panels.copy(&doc, &clipboard, Instant::now()).await?;
    Ok(Json(CopyResponse {
        panel,
        clipboard_text: clipboard.take(),
    }))
}

pub async fn confirm_withholding(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<CopyResponse>, AppError> {
    let doc = find_document(&state, id)?;
    let clipboard = CapturedClipboard::new();
    let panel = state
        .panels
        .confirm(&doc, req.has_withholding, &clipboard, Instant::now())
        .await?;
    Ok(Json(CopyResponse {
        panel,
        clipboard_text: clipboard.take(),
    }))
}

pub async fn copy_row(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<CopyResponse>, AppError> {
    let doc = find_document(&state, id)?;
    let clipboard = CapturedClipboard::new();
    let panel = state
        .panels
        .copy_row(&doc, index, &clipboard, Instant::now())
        .await?;
    Ok(Json(CopyResponse {
        panel,
        clipboard_text: clipboard.take(),
    }))
}

fn find_document(state: &AppState, id: Uuid) -> Result<Document, AppError> {
    state
        .orchestrator
        .get(id)
        .ok_or(AppError::DocumentNotFound(id))
}

fn document_view(state: &AppState, document: Document) -> DocumentView {
    let reconciliation = match (&document.result, &document.calculated_total) {
        (Some(result), Some(calculated)) => {
            Some(state.reconciler.check(&result.header_total, calculated))
        }
        _ => None,
    };
    DocumentView {
        document,
        reconciliation,
    }
}
