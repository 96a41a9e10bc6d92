pub mod document;
pub mod extraction;
pub mod panel;

pub use document::{is_document_mime, Document, DocumentStatus, UploadedFile};
pub use extraction::{ExtractionResult, LineItem};
pub use panel::{CalculationMode, Category, CopyStage, PanelView, RowEmphasis, RowView};
