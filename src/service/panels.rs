use dashmap::DashMap;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clipboard::Clipboard;
use crate::error::AppError;
use crate::models::{CalculationMode, Document, DocumentStatus, ExtractionResult, PanelView};
use crate::service::calculator::{CalculationPanel, CopyDecision};
use crate::service::classifier::{Classification, Classifier};

/// Calculation panels keyed by document id
pub struct PanelRegistry {
    panels: DashMap<Uuid, CalculationPanel>,
    classifier: Classifier,
}

impl PanelRegistry {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            panels: DashMap::new(),
            classifier,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Read-only: an untouched document gets a fresh, unregistered panel.
    pub fn view(&self, doc: &Document, now: Instant) -> Result<PanelView, AppError> {
        let (result, classification) = self.prepare(doc)?;
        let view = match self.panels.get(&doc.id) {
            Some(panel) => panel.view(doc.id, result, &classification, now),
            None => CalculationPanel::new().view(doc.id, result, &classification, now),
        };
        Ok(view)
    }

    pub fn set_mode(&self, doc: &Document, mode: CalculationMode, now: Instant) -> Result<PanelView, AppError> {
        let (result, classification) = self.prepare(doc)?;
        let mut panel = self.panels.entry(doc.id).or_default();
        panel.set_mode(mode);
        debug!(document_id = %doc.id, mode = ?mode, "Calculation mode changed");
        Ok(panel.view(doc.id, result, &classification, now))
    }

    pub fn set_withholding(&self, doc: &Document, raw: &str, now: Instant) -> Result<PanelView, AppError> {
        let (result, classification) = self.prepare(doc)?;
        let mut panel = self.panels.entry(doc.id).or_default();
        panel.set_withholding_input(raw);
        Ok(panel.view(doc.id, result, &classification, now))
    }

    /// Copy button: copies right away or starts the withholding confirmation.
    pub async fn copy(
        &self,
        doc: &Document,
        clipboard: &dyn Clipboard,
        now: Instant,
    ) -> Result<PanelView, AppError> {
        let (_, classification) = self.prepare(doc)?;
        let decision = self
            .panels
            .entry(doc.id)
            .or_default()
            .request_copy(&classification, now);
        self.apply(doc.id, decision, clipboard, now).await;
        self.view(doc, now)
    }

    pub async fn confirm(
        &self,
        doc: &Document,
        has_withholding: bool,
        clipboard: &dyn Clipboard,
        now: Instant,
    ) -> Result<PanelView, AppError> {
        let (_, classification) = self.prepare(doc)?;
        let decision = self
            .panels
            .entry(doc.id)
            .or_default()
            .confirm_withholding(has_withholding, &classification, now)?;
        self.apply(doc.id, decision, clipboard, now).await;
        self.view(doc, now)
    }

    /// Copies one retention row's total.
    pub async fn copy_row(
        &self,
        doc: &Document,
        index: usize,
        clipboard: &dyn Clipboard,
        now: Instant,
    ) -> Result<PanelView, AppError> {
        let (result, classification) = self.prepare(doc)?;
        let text = self
            .panels
            .entry(doc.id)
            .or_default()
            .request_row_copy(result, &classification, index)?;

        match clipboard.write_text(&text).await {
            Ok(()) => {
                if let Some(mut panel) = self.panels.get_mut(&doc.id) {
                    panel.mark_row_copied(index, now);
                }
            }
            Err(e) => warn!(document_id = %doc.id, row = index, error = %e, "Row copy failed"),
        }
        self.view(doc, now)
    }

    pub fn clear(&self) {
        self.panels.clear();
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    fn prepare<'a>(&self, doc: &'a Document) -> Result<(&'a ExtractionResult, Classification), AppError> {
        match (&doc.status, &doc.result) {
            (DocumentStatus::Success, Some(result)) => {
                Ok((result, self.classifier.classify(&result.items)))
            }
            _ => Err(AppError::DocumentNotReady(doc.id)),
        }
    }

    // No map guard is held across the clipboard write.
    async fn apply(&self, id: Uuid, decision: CopyDecision, clipboard: &dyn Clipboard, now: Instant) {
        let CopyDecision::Copy(text) = decision else {
            return;
        };

        let written = clipboard.write_text(&text).await;
        let Some(mut panel) = self.panels.get_mut(&id) else {
            return;
        };
        match written {
            Ok(()) => {
                debug!(document_id = %id, text = %text, "Final value copied");
                panel.mark_copied(now);
            }
            Err(e) => {
                warn!(document_id = %id, error = %e, "Clipboard write failed");
                panel.mark_copy_failed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{CapturedClipboard, ClipboardError};
    use crate::models::{CopyStage, LineItem, UploadedFile};
    use crate::service::calculator::COPIED_ACK;
    use async_trait::async_trait;
    use bigdecimal::{BigDecimal, Zero};
    use std::str::FromStr;

    struct DeniedClipboard;

    #[async_trait]
    impl Clipboard for DeniedClipboard {
        async fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError("permission denied".to_string()))
        }
    }

    fn line(code: &str, description: &str, total: &str) -> LineItem {
        LineItem {
            code: code.to_string(),
            description: Some(description.to_string()),
            principal: BigDecimal::from_str(total).unwrap(),
            multa: BigDecimal::zero(),
            juros: BigDecimal::zero(),
            total: BigDecimal::from_str(total).unwrap(),
        }
    }

    fn extracted() -> Document {
        let mut doc = Document::pending(&UploadedFile::new("darf.pdf", "application/pdf", Vec::new()));
        let result = ExtractionResult {
            header_total: BigDecimal::from_str("1740.00").unwrap(),
            items: vec![
                line("1082", "CP Patronal", "1000.00"),
                line("1099", "CP Contribuinte Individual", "200.00"),
                line("5952", "Retenção CSRF", "540.00"),
            ],
        };
        doc.calculated_total = Some(result.items_total());
        doc.result = Some(result);
        doc.status = DocumentStatus::Success;
        doc
    }

    #[tokio::test]
    async fn copy_with_withholding_writes_adjusted_value() {
        let registry = PanelRegistry::new(Classifier::default());
        let doc = extracted();
        let clipboard = CapturedClipboard::new();
        let now = Instant::now();

        registry.set_withholding(&doc, "10000", now).unwrap();
        let view = registry.copy(&doc, &clipboard, now).await.unwrap();

        assert_eq!(clipboard.take(), Some("900,00".to_string()));
        assert_eq!(view.stage, CopyStage::Copied);
        assert_eq!(registry.view(&doc, now + COPIED_ACK).unwrap().stage, CopyStage::Idle);
    }

    #[tokio::test]
    async fn zero_withholding_goes_through_confirmation() {
        let registry = PanelRegistry::new(Classifier::default());
        let doc = extracted();
        let clipboard = CapturedClipboard::new();
        let now = Instant::now();

        let view = registry.copy(&doc, &clipboard, now).await.unwrap();
        assert_eq!(view.stage, CopyStage::Verifying);
        assert_eq!(clipboard.take(), None);

        let view = registry.confirm(&doc, true, &clipboard, now).await.unwrap();
        assert_eq!(view.stage, CopyStage::Verifying);
        assert!(view.validation_message.is_some());
        assert!(view.focus_withholding);
        assert_eq!(clipboard.take(), None);

        let view = registry.confirm(&doc, false, &clipboard, now).await.unwrap();
        assert_eq!(view.stage, CopyStage::Copied);
        assert_eq!(clipboard.take(), Some("1.000,00".to_string()));
    }

    #[tokio::test]
    async fn clipboard_failure_only_skips_acknowledgment() {
        let registry = PanelRegistry::new(Classifier::default());
        let doc = extracted();
        let now = Instant::now();

        registry.set_withholding(&doc, "100", now).unwrap();
        let view = registry.copy(&doc, &DeniedClipboard, now).await.unwrap();
        assert_eq!(view.stage, CopyStage::Idle);

        let view = registry.copy_row(&doc, 2, &DeniedClipboard, now).await.unwrap();
        assert!(!view.rows[2].copied);
        assert_eq!(view.withholding_input, "1,00");
    }

    #[tokio::test]
    async fn row_copy_is_limited_to_retention_rows() {
        let registry = PanelRegistry::new(Classifier::default());
        let doc = extracted();
        let clipboard = CapturedClipboard::new();
        let now = Instant::now();

        let view = registry.copy_row(&doc, 2, &clipboard, now).await.unwrap();
        assert!(view.rows[2].copied);
        assert_eq!(view.stage, CopyStage::Idle);
        assert_eq!(clipboard.take(), Some("540,00".to_string()));

        let err = registry.copy_row(&doc, 0, &clipboard, now).await.unwrap_err();
        assert!(matches!(err, AppError::Panel(_)));
    }

    #[test]
    fn viewing_does_not_register_a_panel() {
        let registry = PanelRegistry::new(Classifier::default());
        let doc = extracted();
        let now = Instant::now();

        let view = registry.view(&doc, now).unwrap();
        assert_eq!(view.stage, CopyStage::Idle);
        assert_eq!(view.mode, CalculationMode::Employee);
        assert!(registry.is_empty());

        registry.set_withholding(&doc, "100", now).unwrap();
        registry.clear();
        registry.view(&doc, now).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn pending_documents_have_no_panel() {
        let registry = PanelRegistry::new(Classifier::default());
        let doc = Document::pending(&UploadedFile::new("x.pdf", "application/pdf", Vec::new()));

        let err = registry.view(&doc, Instant::now()).unwrap_err();
        assert!(matches!(err, AppError::DocumentNotReady(id) if id == doc.id));
        assert!(registry.is_empty());
    }

    #[test]
    fn individual_mode_sums_individual_rows() {
        let registry = PanelRegistry::new(Classifier::default());
        let doc = extracted();
        let now = Instant::now();

        registry.set_withholding(&doc, "2550", now).unwrap();
        let view = registry
            .set_mode(&doc, CalculationMode::Individual, now)
            .unwrap();
        assert_eq!(view.final_value, BigDecimal::from_str("225.50").unwrap());
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }
}
