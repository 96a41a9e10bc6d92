use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::extractor::Extractor;
use crate::models::{Document, DocumentStatus, ExtractionResult, UploadedFile};

/// Immutable, most-recent-first view of every document.
pub type Snapshot = Arc<Vec<Document>>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no files selected")]
    NoFiles,

    #[error("document orchestrator is not running")]
    Stopped,
}

enum Command {
    Submit {
        files: Vec<UploadedFile>,
        reply: oneshot::Sender<Vec<Document>>,
    },
    Started(Uuid),
    Finished {
        id: Uuid,
        outcome: Result<ExtractionResult, String>,
    },
    Clear {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the task that owns the document list.
///
/// Only that task mutates documents; handles send commands and read
/// snapshots published through a `watch` channel.
#[derive(Clone)]
pub struct DocumentOrchestrator {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<Snapshot>,
}

impl DocumentOrchestrator {
    /// Starts the owner task on the current tokio runtime.
    pub fn spawn(extractor: Arc<dyn Extractor>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Vec::new()));

        let worker = Worker {
            documents: IndexMap::new(),
            extractor,
            commands: tx.downgrade(),
            snapshot: snapshot_tx,
        };
        tokio::spawn(worker.run(rx));

        Self {
            commands: tx,
            snapshot: snapshot_rx,
        }
    }

    /// Creates one Pending document per file and starts their extractions.
    ///
    /// Returns the new documents in selection order; they sit at the top of
    /// the list in that same order.
    pub async fn submit(&self, files: Vec<UploadedFile>) -> Result<Vec<Document>, OrchestratorError> {
        if files.is_empty() {
            return Err(OrchestratorError::NoFiles);
        }
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit { files, reply })
            .map_err(|_| OrchestratorError::Stopped)?;
        rx.await.map_err(|_| OrchestratorError::Stopped)
    }

    /// Removes every document. In-flight extractions finish but their results are dropped.
    pub async fn clear(&self) -> Result<usize, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Clear { reply })
            .map_err(|_| OrchestratorError::Stopped)?;
        rx.await.map_err(|_| OrchestratorError::Stopped)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Document> {
        self.snapshot.borrow().iter().find(|d| d.id == id).cloned()
    }

    /// Resolves with the first snapshot that satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<Snapshot, OrchestratorError>
    where
        F: FnMut(&[Document]) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|docs| predicate(docs))
            .await
            .map_err(|_| OrchestratorError::Stopped)?;
        Ok(snapshot.clone())
    }

    pub async fn wait_until_settled(&self) -> Result<Snapshot, OrchestratorError> {
        self.wait_for(|docs| docs.iter().all(Document::is_settled)).await
    }
}

struct Worker {
    documents: IndexMap<Uuid, Document>,
    extractor: Arc<dyn Extractor>,
    // weak, so the worker stops once every handle and task is gone
    commands: mpsc::WeakUnboundedSender<Command>,
    snapshot: watch::Sender<Snapshot>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!(extractor = self.extractor.name(), "Document orchestrator started");

        while let Some(command) = rx.recv().await {
            match command {
                Command::Submit { files, reply } => self.submit(files, reply),
                Command::Started(id) => self.mark_processing(id),
                Command::Finished { id, outcome } => self.finish(id, outcome),
                Command::Clear { reply } => {
                    let removed = self.documents.len();
                    self.documents.clear();
                    self.publish();
                    info!(removed, "Documents cleared");
                    let _ = reply.send(removed);
                }
            }
        }

        info!("Document orchestrator channel closed, shutting down");
    }

    fn submit(&mut self, files: Vec<UploadedFile>, reply: oneshot::Sender<Vec<Document>>) {
        let created: Vec<Document> = files.iter().map(Document::pending).collect();
        for doc in created.iter().rev() {
            self.documents.shift_insert(0, doc.id, doc.clone());
        }
        self.publish();
        info!(count = created.len(), total = self.documents.len(), "Documents queued");
        let _ = reply.send(created.clone());

        for (doc, file) in created.into_iter().zip(files) {
            self.spawn_extraction(doc.id, file);
        }
    }

    /// One independent task per document; failures stay with their document.
    fn spawn_extraction(&self, id: Uuid, file: UploadedFile) {
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let extractor = self.extractor.clone();

        tokio::spawn(async move {
            let _ = commands.send(Command::Started(id));
            let outcome = extractor.extract(&file).await.map_err(|e| e.to_string());
            let _ = commands.send(Command::Finished { id, outcome });
        });
    }

    fn mark_processing(&mut self, id: Uuid) {
        let Some(doc) = self.documents.get_mut(&id) else {
            return;
        };
        if doc.status == DocumentStatus::Pending {
            doc.status = DocumentStatus::Processing;
            debug!(document_id = %id, file = %doc.file_name, "Extraction started");
            self.publish();
        }
    }

    fn finish(&mut self, id: Uuid, outcome: Result<ExtractionResult, String>) {
        let Some(doc) = self.documents.get_mut(&id) else {
            debug!(document_id = %id, "Result for a cleared document dropped");
            return;
        };

        match outcome {
            Ok(result) => {
                let calculated = result.items_total();
                info!(
                    document_id = %id,
                    file = %doc.file_name,
                    items = result.items.len(),
                    header_total = %result.header_total,
                    calculated_total = %calculated,
                    "Extraction succeeded"
                );
                doc.calculated_total = Some(calculated);
                doc.result = Some(result);
                doc.error_message = None;
                doc.status = DocumentStatus::Success;
            }
            Err(message) => {
                error!(document_id = %id, file = %doc.file_name, error = %message, "Extraction failed");
                doc.error_message = Some(message);
                doc.status = DocumentStatus::Error;
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot: Vec<Document> = self.documents.values().cloned().collect();
        self.snapshot.send_replace(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractionError;
    use crate::models::LineItem;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;
    use tokio::sync::Semaphore;

    /// Fails for files named `broken*`, holds every call until the gate opens.
    struct GatedExtractor {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Extractor for GatedExtractor {
        fn name(&self) -> &str {
            "gated"
        }

        async fn extract(&self, file: &UploadedFile) -> Result<ExtractionResult, ExtractionError> {
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            if file.file_name.starts_with("broken") {
                return Err(ExtractionError::Overloaded { attempts: 4 });
            }
            Ok(ExtractionResult {
                header_total: BigDecimal::from_str("30.00").unwrap(),
                items: vec![line("1082", "10.00"), line("5952", "20.00")],
            })
        }
    }

    fn line(code: &str, total: &str) -> LineItem {
        let total = BigDecimal::from_str(total).unwrap();
        LineItem {
            code: code.to_string(),
            description: None,
            principal: total.clone(),
            multa: BigDecimal::from(0),
            juros: BigDecimal::from(0),
            total,
        }
    }

    fn file(name: &str) -> UploadedFile {
        UploadedFile::new(name, "application/pdf", vec![0u8; 4])
    }

    fn gated() -> (DocumentOrchestrator, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let orchestrator = DocumentOrchestrator::spawn(Arc::new(GatedExtractor { gate: gate.clone() }));
        (orchestrator, gate)
    }

    #[tokio::test]
    async fn documents_move_through_statuses_independently() {
        let (orchestrator, gate) = gated();

        let created = orchestrator
            .submit(vec![file("a.pdf"), file("broken.pdf"), file("c.pdf")])
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|d| d.status == DocumentStatus::Pending));

        orchestrator
            .wait_for(|docs| docs.iter().all(|d| d.status == DocumentStatus::Processing))
            .await
            .unwrap();

        gate.add_permits(3);
        let docs = orchestrator.wait_until_settled().await.unwrap();

        let by_name = |name: &str| docs.iter().find(|d| d.file_name == name).unwrap().clone();
        assert_eq!(by_name("broken.pdf").status, DocumentStatus::Error);
        assert!(by_name("broken.pdf").error_message.unwrap().contains("overloaded"));
        for name in ["a.pdf", "c.pdf"] {
            let doc = by_name(name);
            assert_eq!(doc.status, DocumentStatus::Success);
            assert_eq!(doc.calculated_total, Some(BigDecimal::from_str("30.00").unwrap()));
            assert!(doc.error_message.is_none());
        }
    }

    #[tokio::test]
    async fn newest_batch_comes_first() {
        let (orchestrator, _gate) = gated();

        orchestrator.submit(vec![file("old.pdf")]).await.unwrap();
        orchestrator
            .submit(vec![file("new1.pdf"), file("new2.pdf")])
            .await
            .unwrap();

        let names: Vec<_> = orchestrator
            .snapshot()
            .iter()
            .map(|d| d.file_name.clone())
            .collect();
        assert_eq!(names, vec!["new1.pdf", "new2.pdf", "old.pdf"]);
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let (orchestrator, _gate) = gated();
        assert!(matches!(orchestrator.submit(Vec::new()).await, Err(OrchestratorError::NoFiles)));
    }

    #[tokio::test]
    async fn clear_drops_late_results() {
        let (orchestrator, gate) = gated();

        let created = orchestrator.submit(vec![file("a.pdf")]).await.unwrap();
        assert!(orchestrator.get(created[0].id).is_some());

        assert_eq!(orchestrator.clear().await.unwrap(), 1);
        gate.add_permits(1);
        // a later submit round-trips through the worker after the stale result
        orchestrator.submit(vec![file("b.pdf")]).await.unwrap();
        gate.add_permits(1);
        let docs = orchestrator.wait_until_settled().await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name, "b.pdf");
        assert!(orchestrator.get(created[0].id).is_none());
    }
}
