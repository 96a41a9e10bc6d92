pub mod api;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod extractor;
pub mod format;
pub mod models;
pub mod service;

pub use api::{router, AppState};
pub use config::AppConfig;
pub use error::AppError;
pub use extractor::{Extractor, GeminiExtractor};
pub use service::{DocumentOrchestrator, PanelRegistry};
