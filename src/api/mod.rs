pub mod handlers;


use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

use crate::service::{DocumentOrchestrator, PanelRegistry, Reconciler};

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: DocumentOrchestrator,
    pub panels: Arc<PanelRegistry>,
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    pub fn new(orchestrator: DocumentOrchestrator, panels: PanelRegistry, reconciler: Reconciler) -> Self {
        Self {
            orchestrator,
            panels: Arc::new(panels),
            reconciler: Arc::new(reconciler),
        }
    }
}

/// All API routes; uploads are capped at `max_upload_bytes`.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let document_routes = Router::new()
        .route(
            "/api/documents",
            post(handlers::upload_documents)
                .get(handlers::list_documents)
                .delete(handlers::clear_documents),
        )
        .route("/api/documents/:id", get(handlers::get_document));

    let panel_routes = Router::new()
        .route("/api/documents/:id/panel", get(handlers::get_panel))
        .route("/api/documents/:id/panel/mode", put(handlers::set_mode))
        .route("/api/documents/:id/panel/withholding", put(handlers::set_withholding))
        .route("/api/documents/:id/panel/copy", post(handlers::copy_final_value))
        .route("/api/documents/:id/panel/confirm", post(handlers::confirm_withholding))
        .route("/api/documents/:id/rows/:index/copy", post(handlers::copy_row));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(document_routes)
        .merge(panel_routes)
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(max_upload_bytes)))
        .with_state(state)
}
