//! Background ingestion: upload events in, one pipeline run per event.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{error, info, warn};

use syllatrack_extraction::TextGenerator;
use syllatrack_shared::{Result, SyllatrackError};
use syllatrack_storage::{BlobStore, DocumentStore};

use crate::pipeline::{IngestContext, IngestOutcome, SilentProgress, ingest_document};

/// Events the ingestion worker reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// A new document landed in the syllabus container.
    DocumentUploaded { name: String },
}

/// Sending half handed to upload entry points.
#[derive(Debug, Clone)]
pub struct IngestTrigger {
    tx: mpsc::Sender<IngestEvent>,
}

impl IngestTrigger {
    #[cfg(test)]
    pub(crate) fn from_sender(tx: mpsc::Sender<IngestEvent>) -> Self {
        Self { tx }
    }

    /// Queue `event` for the worker.
    pub async fn fire(&self, event: IngestEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| SyllatrackError::Extraction("ingestion worker has stopped".into()))
    }
}

/// Everything a background run needs, shared across runs.
#[derive(Clone)]
pub struct IngestWorker {
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub generator: Arc<dyn TextGenerator>,
    /// Owner of courses created from uploads.
    pub owner: String,
}

impl IngestWorker {
    /// Start the worker loop.
    ///
    /// Each event gets its own task so documents ingest concurrently. Once every
    /// [`IngestTrigger`] is dropped the loop drains in-flight runs and exits.
    pub fn spawn(self, capacity: usize) -> (IngestTrigger, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        let handle = tokio::spawn(async move {
            let mut runs = JoinSet::new();

            while let Some(event) = rx.recv().await {
                let worker = self.clone();
                runs.spawn(async move { worker.handle(event).await });
                // Reap finished runs so the set does not grow unbounded
                while let Some(joined) = runs.try_join_next() {
                    log_panic(joined);
                }
            }

            while let Some(joined) = runs.join_next().await {
                log_panic(joined);
            }
            info!("ingestion worker stopped");
        });

        (IngestTrigger { tx }, handle)
    }

    /// Run the pipeline for one event. Outcomes and failures only reach the log.
    async fn handle(&self, event: IngestEvent) {
        match event {
            IngestEvent::DocumentUploaded { name } => {
                info!(blob = %name, "ingestion triggered");
                let ctx = IngestContext {
                    store: self.store.as_ref(),
                    blobs: self.blobs.as_ref(),
                    generator: self.generator.as_ref(),
                };

                match ingest_document(ctx, &name, &self.owner, &SilentProgress).await {
                    Ok(IngestOutcome::Ingested {
                        course_id,
                        tasks_written,
                        tasks_failed,
                    }) => info!(blob = %name, %course_id, tasks_written, tasks_failed, "ingestion complete"),
                    Ok(IngestOutcome::NothingToIngest) => {
                        info!(blob = %name, "no text extracted from syllabus, skipped")
                    }
                    Ok(IngestOutcome::LowConfidence) => {
                        info!(blob = %name, "course info not extracted, skipped")
                    }
                    Err(e) => warn!(blob = %name, error = %e, "ingestion failed"),
                }
            }
        }
    }
}

fn log_panic(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "ingestion run panicked");
    }
}
