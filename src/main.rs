use darf_reconciler::{
    router, AppConfig, AppState, DocumentOrchestrator, GeminiExtractor, PanelRegistry,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Local-time log lines
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);
    if config.extractor.api_key.is_none() {
        warn!("No AI API key configured, every extraction will fail until GEMINI_API_KEY is set");
    }

    // Extraction collaborator and document orchestrator
    let extractor = Arc::new(GeminiExtractor::new(config.extractor.clone())?);
    let orchestrator = DocumentOrchestrator::spawn(extractor);

    let state = AppState::new(
        orchestrator,
        PanelRegistry::new(config.policy.classifier()),
        config.policy.reconciler()?,
    );
    let app = router(state, config.server.max_upload_bytes);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST   /api/documents                       - upload DARF files");
    info!("  GET    /api/documents                       - list documents");
    info!("  DELETE /api/documents                       - clear documents");
    info!("  GET    /api/documents/:id/panel             - calculation panel");
    info!("  POST   /api/documents/:id/panel/copy        - copy final value");
    info!("  POST   /api/documents/:id/rows/:index/copy  - copy retention row");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
