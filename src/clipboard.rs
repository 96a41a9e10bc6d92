use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("clipboard write failed: {0}")]
pub struct ClipboardError(pub String);

/// Destination of copy actions.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Records what was written; the browser does the real write.
#[derive(Debug, Default)]
pub struct CapturedClipboard {
    written: Mutex<Option<String>>,
}

impl CapturedClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last text written, if any.
    pub fn take(&self) -> Option<String> {
        self.written.lock().ok().and_then(|mut guard| guard.take())
    }
}

#[async_trait]
impl Clipboard for CapturedClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut guard = self
            .written
            .lock()
            .map_err(|_| ClipboardError("clipboard lock poisoned".to_string()))?;
        *guard = Some(text.to_string());
        Ok(())
    }
}
