//! Syllabus extraction for Syllatrack.
//!
//! Turns free-text syllabus content into a course name, instructor, semester
//! and a list of graded task drafts by asking a [`TextGenerator`] for JSON and
//! recovering that JSON from whatever the model actually replied.

pub mod client;
pub mod decode;
pub mod prompt;
pub mod sanitize;

use serde_json::Value;
use syllatrack_shared::TaskKind;
use syllatrack_shared::dates::normalize_date;
use tracing::{debug, instrument, warn};

pub use client::{ChatClient, GenerationRequest, TextGenerator};
pub use decode::{DocumentFormat, decode_document};
pub use prompt::{MAX_SYLLABUS_CHARS, SYSTEM_INSTRUCTION, build_prompt};
pub use sanitize::recover_json_object;

// ---------------------------------------------------------------------------
// Extraction result
// ---------------------------------------------------------------------------

/// One graded item as the model described it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    /// Canonical `YYYY-MM-DD`, or `None` when missing or unparseable.
    pub due_date: Option<String>,
    /// A [`TaskKind`] label when recognised, the model's own text otherwise.
    pub kind: Option<String>,
    pub weight: Option<f64>,
}

/// Structured data recovered from one syllabus. Never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Always non-blank.
    pub course_name: String,
    pub instructor: Option<String>,
    pub semester: Option<String>,
    pub tasks: Vec<TaskDraft>,
}

impl ExtractionResult {
    /// Decode a recovered JSON object.
    ///
    /// Returns `None` when the course name is absent or blank. Other fields
    /// are decoded leniently: anything undeterminable becomes `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let course_name = text_field(value, "courseName")?;

        let tasks = value
            .get("tasks")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(TaskDraft::from_value).collect())
            .unwrap_or_default();

        Some(Self {
            course_name,
            instructor: text_field(value, "instructor"),
            semester: text_field(value, "semester"),
            tasks,
        })
    }
}

impl TaskDraft {
    /// Decode one entry of the `tasks` array. Entries without a title are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let title = text_field(value, "title")?;
        let due_date = normalize_date(text_field(value, "dueDate").as_deref());
        let kind = text_field(value, "type").map(|label| match TaskKind::from_label(&label) {
            Some(kind) => kind.as_str().to_string(),
            None => label,
        });

        Some(Self {
            title,
            due_date,
            kind,
            weight: value.get("weight").and_then(weight_value),
        })
    }
}

/// A trimmed, non-empty string field.
fn text_field(value: &Value, key: &str) -> Option<String> {
    let s = value.get(key)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Numbers pass through; numeric strings such as `"15"` or `"15%"` are parsed.
fn weight_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Run extraction over `text`.
///
/// Returns `None` when the service fails, the reply holds no JSON object, or
/// the object has no usable course name. Service failures are logged here and
/// never propagate.
#[instrument(skip_all, fields(text_chars = text.chars().count()))]
pub async fn extract_syllabus(
    text: &str,
    generator: &dyn TextGenerator,
) -> Option<ExtractionResult> {
    let request = GenerationRequest {
        system: SYSTEM_INSTRUCTION.to_string(),
        prompt: build_prompt(text),
        deterministic: true,
        json_output: true,
    };

    let reply = match generator.generate(&request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "text generation failed");
            return None;
        }
    };

    let Some(value) = recover_json_object(&reply) else {
        warn!(reply_len = reply.len(), "no JSON object in model reply");
        return None;
    };

    let result = ExtractionResult::from_value(&value);
    match &result {
        Some(r) => debug!(course = %r.course_name, tasks = r.tasks.len(), "extracted syllabus"),
        None => debug!("model reply has no course name"),
    }
    result
}
