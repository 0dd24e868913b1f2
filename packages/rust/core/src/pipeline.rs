//! Ingestion pipeline: blob → text → extraction → one course and N tasks.

use std::time::Instant;

use tracing::{info, instrument, warn};

use syllatrack_extraction::{TextGenerator, decode_document, extract_syllabus};
use syllatrack_shared::{Course, Result, SyllatrackError, Task, new_course_id, new_task_id};
use syllatrack_storage::{BlobStore, DocumentStore};

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A course was written, plus every task that could be.
    Ingested {
        course_id: String,
        tasks_written: usize,
        tasks_failed: usize,
    },
    /// The document decoded to empty or whitespace-only text.
    NothingToIngest,
    /// Extraction produced no usable course name.
    LowConfidence,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn phase(&self, name: &str);
    /// Called after each task write attempt.
    fn task_written(&self, current: usize, total: usize);
    /// Called when the run reaches a terminal state.
    fn done(&self, outcome: &IngestOutcome);
}

/// No-op progress reporter for background and test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn task_written(&self, _current: usize, _total: usize) {}
    fn done(&self, _outcome: &IngestOutcome) {}
}

/// Collaborators one pipeline run needs.
#[derive(Clone, Copy)]
pub struct IngestContext<'a> {
    pub store: &'a dyn DocumentStore,
    pub blobs: &'a dyn BlobStore,
    pub generator: &'a dyn TextGenerator,
}

/// Run the pipeline for the blob called `name`, creating records owned by `owner`.
///
/// 1. Read the blob
/// 2. Decode it to plain text
/// 3. Extract course and task drafts
/// 4. Write the course
/// 5. Write each task independently
///
/// Stages run in order with no retries. A read, decode or course-write failure
/// aborts the run with an error; task-write failures are logged and counted.
#[instrument(skip_all, fields(blob = %name, owner = %owner))]
pub async fn ingest_document(
    ctx: IngestContext<'_>,
    name: &str,
    owner: &str,
    progress: &dyn ProgressReporter,
) -> Result<IngestOutcome> {
    let start = Instant::now();

    // --- Stage 1: Read ---
    progress.phase("Reading document");
    let bytes = ctx.blobs.get(name).await?;

    // --- Stage 2: Decode ---
    progress.phase("Extracting text");
    let text = decode_blocking(name, bytes).await?;
    info!(text_chars = text.chars().count(), "decoded document");

    if text.trim().is_empty() {
        info!("no text in document, skipping");
        return Ok(finish(progress, IngestOutcome::NothingToIngest));
    }

    // --- Stage 3: Extract ---
    progress.phase("Extracting course data");
    let Some(extracted) = extract_syllabus(&text, ctx.generator).await else {
        info!("could not confidently extract course info, skipping");
        return Ok(finish(progress, IngestOutcome::LowConfidence));
    };

    // --- Stage 4: Persist course ---
    progress.phase("Saving course");
    let course = Course {
        id: new_course_id(),
        user_id: owner.to_string(),
        name: extracted.course_name,
        instructor: extracted.instructor,
        semester: extracted.semester,
        task_count: u32::try_from(extracted.tasks.len()).unwrap_or(u32::MAX),
        source_blob: Some(name.to_string()),
    };
    ctx.store.create_course(&course).await?;

    // --- Stage 5: Persist tasks ---
    progress.phase("Saving tasks");
    let total = extracted.tasks.len();
    let mut tasks_written = 0usize;
    let mut tasks_failed = 0usize;

    for (i, draft) in extracted.tasks.into_iter().enumerate() {
        let task = Task {
            id: new_task_id(),
            course_id: course.id.clone(),
            title: draft.title,
            due_date: draft.due_date,
            kind: draft.kind,
            weight: draft.weight,
        };

        match ctx.store.create_task(&task).await {
            Ok(()) => tasks_written += 1,
            Err(e) => {
                warn!(title = %task.title, error = %e, "failed to save task");
                tasks_failed += 1;
            }
        }
        progress.task_written(i + 1, total);
    }

    info!(
        course_id = %course.id,
        course = %course.name,
        tasks_written,
        tasks_failed,
        elapsed_ms = start.elapsed().as_millis(),
        "ingested syllabus"
    );

    Ok(finish(
        progress,
        IngestOutcome::Ingested {
            course_id: course.id,
            tasks_written,
            tasks_failed,
        },
    ))
}

/// Decode on a blocking thread; a decoder panic becomes an extraction error.
async fn decode_blocking(name: &str, bytes: Vec<u8>) -> Result<String> {
    let owned = name.to_string();
    tokio::task::spawn_blocking(move || decode_document(&owned, &bytes))
        .await
        .map_err(|e| SyllatrackError::Extraction(format!("document decoder crashed: {e}")))?
}

fn finish(progress: &dyn ProgressReporter, outcome: IngestOutcome) -> IngestOutcome {
    progress.done(&outcome);
    outcome
}
