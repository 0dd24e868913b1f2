//! Core domain logic for Syllatrack.
//!
//! This crate ties the stores and the extractor together: the ingestion
//! pipeline and its background trigger, the dashboard aggregation, and the
//! [`Tracker`](service::Tracker) operations every entry point calls.

pub mod insights;
pub mod pipeline;
pub mod service;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use pipeline::{IngestContext, IngestOutcome, ProgressReporter, SilentProgress, ingest_document};
pub use service::{CascadeReport, NewCourse, NewTask, Tracker};
pub use trigger::{IngestEvent, IngestTrigger, IngestWorker};
