//! The extraction prompt.

use syllatrack_shared::TaskKind;

/// System instruction sent with every extraction request.
pub const SYSTEM_INSTRUCTION: &str = "You extract structured data from course syllabi.";

/// Maximum number of syllabus characters embedded in the prompt.
pub const MAX_SYLLABUS_CHARS: usize = 12_000;

/// Keep at most `max_chars` characters of `text`, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the user prompt for `text`. Oversized input is truncated, not chunked.
pub fn build_prompt(text: &str) -> String {
    let kinds = TaskKind::ALL
        .iter()
        .map(|k| format!("\"{}\"", k.as_str()))
        .collect::<Vec<_>>()
        .join(" | ");
    let body = truncate_chars(text, MAX_SYLLABUS_CHARS);

    format!(
        r#"You are parsing a university course syllabus.

From the syllabus text below, extract:
- The course name
- The instructor name, if present
- The semester or term
- A list of graded tasks (homework, exams, projects, quizzes, labs, etc.)

Return ONLY valid JSON (no markdown, no code fences, no backticks) in this exact shape:

{{
  "courseName": string,
  "instructor": string | null,
  "semester": string | null,
  "tasks": [
    {{
      "title": string,
      "dueDate": "YYYY-MM-DD" | null,
      "type": {kinds} | null,
      "weight": number | null
    }}
  ]
}}

If unsure about any field, set it to null. Never guess with an empty string.

Syllabus text:
"""{body}""""#
    )
}
