pub mod calculator;
pub mod classifier;
pub mod orchestrator;
pub mod panels;
pub mod reconciliation;

pub use calculator::{CalculationPanel, CopyDecision, PanelError};
pub use classifier::{Classification, Classifier};
pub use orchestrator::{DocumentOrchestrator, OrchestratorError, Snapshot};
pub use panels::PanelRegistry;
pub use reconciliation::{Reconciler, Reconciliation};
