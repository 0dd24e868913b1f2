//! Core domain types: courses and the graded tasks that belong to them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for generated course identifiers.
pub const COURSE_ID_PREFIX: &str = "course-";

/// Prefix for generated task identifiers.
pub const TASK_ID_PREFIX: &str = "task-";

/// Generate a new globally unique course identifier.
pub fn new_course_id() -> String {
    format!("{COURSE_ID_PREFIX}{}", Uuid::now_v7())
}

/// Generate a new globally unique task identifier.
pub fn new_task_id() -> String {
    format!("{TASK_ID_PREFIX}{}", Uuid::now_v7())
}

// ---------------------------------------------------------------------------
// Course
// ---------------------------------------------------------------------------

/// A tracked academic course, partitioned by its owning user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// `course-` prefixed identifier.
    pub id: String,
    /// Owning user (partition key).
    pub user_id: String,
    /// Course name; never blank.
    #[serde(rename = "courseName")]
    pub name: String,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
    /// Number of tasks known when the course was created.
    #[serde(rename = "numAssignments", default)]
    pub task_count: u32,
    /// Name of the syllabus blob this course was extracted from.
    #[serde(default)]
    pub source_blob: Option<String>,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A gradable item (assignment, exam, ...) belonging to a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// `task-` prefixed identifier.
    pub id: String,
    /// Owning course (partition key).
    pub course_id: String,
    /// Task title; never blank.
    pub title: String,
    /// Due date as `YYYY-MM-DD`.
    #[serde(default)]
    pub due_date: Option<String>,
    /// Free-text type label, usually one of [`TaskKind`].
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Grade weight; unit and range are not constrained.
    #[serde(default)]
    pub weight: Option<f64>,
}

/// The closed label set the extraction prompt asks the model to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Homework,
    Quiz,
    Exam,
    Project,
    Paper,
    Lab,
    Other,
}

impl TaskKind {
    /// Every label, in prompt order.
    pub const ALL: [TaskKind; 7] = [
        Self::Homework,
        Self::Quiz,
        Self::Exam,
        Self::Project,
        Self::Paper,
        Self::Lab,
        Self::Other,
    ];

    /// Display label as stored on tasks.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Homework => "Homework",
            Self::Quiz => "Quiz",
            Self::Exam => "Exam",
            Self::Project => "Project",
            Self::Paper => "Paper",
            Self::Lab => "Lab",
            Self::Other => "Other",
        }
    }

    /// Match a label case-insensitively. Unknown labels return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(label))
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
