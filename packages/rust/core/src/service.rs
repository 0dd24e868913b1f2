//! Tracker operations shared by the HTTP surface and the CLI.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use syllatrack_shared::dates::normalize_date;
use syllatrack_shared::{
    Course, DEFAULT_USER_ID, Result, SyllatrackError, Task, TaskKind, new_course_id, new_task_id,
};
use syllatrack_storage::{BlobStore, DocumentStore};

use crate::insights::{Insights, build_insights};
use crate::trigger::{IngestEvent, IngestTrigger};

/// Extension given to uploads whose file name has none.
const DEFAULT_UPLOAD_EXT: &str = "pdf";

/// Input for creating a course directly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
}

/// Input for creating a task directly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// What a cascading course delete actually removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    /// `false` when the course was already gone.
    pub course_deleted: bool,
    pub tasks_deleted: usize,
    pub tasks_failed: usize,
}

/// Entry-point-neutral tracker operations over the document and blob stores.
#[derive(Clone)]
pub struct Tracker {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    trigger: Option<IngestTrigger>,
    default_user: String,
}

impl Tracker {
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            trigger: None,
            default_user: DEFAULT_USER_ID.to_string(),
        }
    }

    /// Fire `trigger` for every uploaded document.
    pub fn with_trigger(mut self, trigger: IngestTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Owner used when a request names none.
    pub fn with_default_user(mut self, user_id: impl Into<String>) -> Self {
        self.default_user = user_id.into();
        self
    }

    pub fn default_user(&self) -> &str {
        &self.default_user
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// `user_id` if given and non-blank, else the default user.
    pub fn resolve_user<'a>(&'a self, user_id: Option<&'a str>) -> &'a str {
        match user_id.map(str::trim) {
            Some(u) if !u.is_empty() => u,
            _ => &self.default_user,
        }
    }

    // --- Courses ---

    pub async fn create_course(&self, input: NewCourse) -> Result<Course> {
        let name = non_blank(input.course_name)
            .ok_or_else(|| SyllatrackError::validation("courseName is required"))?;

        let course = Course {
            id: new_course_id(),
            user_id: self.resolve_user(input.user_id.as_deref()).to_string(),
            name,
            instructor: non_blank(input.instructor),
            semester: non_blank(input.semester),
            task_count: 0,
            source_blob: None,
        };
        self.store.create_course(&course).await?;
        info!(course_id = %course.id, user = %course.user_id, "course created");
        Ok(course)
    }

    /// Point lookup within the user's partition.
    pub async fn get_course(&self, id: &str, user_id: Option<&str>) -> Result<Option<Course>> {
        self.store.get_course(id, self.resolve_user(user_id)).await
    }

    pub async fn list_courses(&self, user_id: Option<&str>) -> Result<Vec<Course>> {
        self.store.list_courses(self.resolve_user(user_id)).await
    }

    /// Delete a course and every task that references it.
    ///
    /// Tasks are removed in one batch first; if the batch is rejected each task
    /// is deleted on its own, carrying on past failures. Deleting records that
    /// are already gone succeeds.
    #[instrument(skip_all, fields(course_id = %id))]
    pub async fn delete_course_cascade(
        &self,
        id: &str,
        user_id: Option<&str>,
    ) -> Result<CascadeReport> {
        let user_id = self.resolve_user(user_id);
        let course_deleted = self.store.delete_course(id, user_id).await?;

        let ids: Vec<String> = self
            .store
            .list_tasks(Some(id))
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        let mut report = CascadeReport {
            course_deleted,
            ..Default::default()
        };
        if ids.is_empty() {
            return Ok(report);
        }

        match self.store.delete_tasks_batch(id, &ids).await {
            Ok(n) => report.tasks_deleted = n,
            Err(e) => {
                warn!(error = %e, tasks = ids.len(), "batch delete rejected, deleting one by one");
                for task_id in &ids {
                    match self.store.delete_task(task_id, id).await {
                        Ok(_) => report.tasks_deleted += 1,
                        Err(e) => {
                            warn!(task_id = %task_id, error = %e, "task delete failed");
                            report.tasks_failed += 1;
                        }
                    }
                }
            }
        }

        info!(
            course_deleted,
            tasks_deleted = report.tasks_deleted,
            tasks_failed = report.tasks_failed,
            "course deleted"
        );
        Ok(report)
    }

    // --- Tasks ---

    pub async fn create_task(&self, input: NewTask) -> Result<Task> {
        let (Some(course_id), Some(title)) = (non_blank(input.course_id), non_blank(input.title))
        else {
            return Err(SyllatrackError::validation("courseId and title are required"));
        };

        let due_date = match non_blank(input.due_date) {
            Some(raw) => Some(normalize_date(Some(raw.as_str())).ok_or_else(|| {
                SyllatrackError::validation(format!("dueDate '{raw}' is not YYYY-MM-DD"))
            })?),
            None => None,
        };

        let kind = non_blank(input.kind).map(|label| match TaskKind::from_label(&label) {
            Some(kind) => kind.as_str().to_string(),
            None => label,
        });

        let task = Task {
            id: new_task_id(),
            course_id,
            title,
            due_date,
            kind,
            weight: input.weight,
        };
        self.store.create_task(&task).await?;
        info!(task_id = %task.id, course_id = %task.course_id, "task created");
        Ok(task)
    }

    pub async fn list_tasks(&self, course_id: Option<&str>) -> Result<Vec<Task>> {
        let course_id = course_id.map(str::trim).filter(|c| !c.is_empty());
        self.store.list_tasks(course_id).await
    }

    /// Delete one task. Returns `false` when it was already gone.
    pub async fn delete_task(&self, id: &str, course_id: Option<&str>) -> Result<bool> {
        let course_id = course_id
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SyllatrackError::validation("courseId is required"))?;
        self.store.delete_task(id, course_id).await
    }

    // --- Documents ---

    /// Store an uploaded document under a fresh `<uuid>.<ext>` name.
    pub async fn store_document(&self, bytes: &[u8], file_name: Option<&str>) -> Result<String> {
        if bytes.is_empty() {
            return Err(SyllatrackError::validation("uploaded document is empty"));
        }

        let name = format!("{}.{}", Uuid::new_v4(), upload_extension(file_name));
        self.blobs.ensure_container().await?;
        self.blobs.put(&name, bytes).await?;
        info!(blob = %name, bytes = bytes.len(), "document stored");
        Ok(name)
    }

    /// Store a document and fire the ingestion trigger for it.
    pub async fn upload_document(&self, bytes: &[u8], file_name: Option<&str>) -> Result<String> {
        let name = self.store_document(bytes, file_name).await?;

        match &self.trigger {
            Some(trigger) => {
                if let Err(e) = trigger
                    .fire(IngestEvent::DocumentUploaded { name: name.clone() })
                    .await
                {
                    warn!(blob = %name, error = %e, "could not queue ingestion");
                }
            }
            None => warn!(blob = %name, "no ingestion trigger configured"),
        }
        Ok(name)
    }

    // --- Insights ---

    /// Dashboard view for one user as of `today`.
    ///
    /// Tasks of other users' courses are left out; tasks whose course exists
    /// nowhere are counted as orphaned.
    pub async fn insights(
        &self,
        user_id: Option<&str>,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Insights> {
        let courses = self.store.list_courses(self.resolve_user(user_id)).await?;
        let mine: HashSet<&str> = courses.iter().map(|c| c.id.as_str()).collect();
        let existing = self.store.course_ids().await?;

        let tasks: Vec<Task> = self
            .store
            .list_tasks(None)
            .await?
            .into_iter()
            .filter(|t| mine.contains(t.course_id.as_str()) || !existing.contains(&t.course_id))
            .collect();
        Ok(build_insights(&courses, &tasks, today, limit))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lower-cased alphanumeric extension of `file_name`, or `pdf`.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_UPLOAD_EXT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FaultyStore, temp_blobs, temp_storage};

    async fn tracker_over(store: impl DocumentStore + 'static) -> Tracker {
        Tracker::new(Arc::new(store), Arc::new(temp_blobs().await))
    }

    async fn seed_course(tracker: &Tracker, name: &str, tasks: usize) -> Course {
        let course = tracker
            .create_course(NewCourse {
                course_name: Some(name.into()),
                ..Default::default()
            })
            .await
            .unwrap();
        for i in 0..tasks {
            tracker
                .create_task(NewTask {
                    course_id: Some(course.id.clone()),
                    title: Some(format!("Task {i}")),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        course
    }

    #[tokio::test]
    async fn create_course_requires_name() {
        let tracker = tracker_over(temp_storage().await).await;
        let err = tracker
            .create_course(NewCourse {
                course_name: Some("   ".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.validation_message().is_some());
        assert_eq!(err.validation_message(), Some("courseName is required"));
    }

    #[tokio::test]
    async fn create_course_defaults_owner_and_blanks() {
        let tracker = tracker_over(temp_storage().await)
            .await
            .with_default_user("alice");
        let course = tracker
            .create_course(NewCourse {
                course_name: Some(" Physics ".into()),
                instructor: Some("".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(course.user_id, "alice");
        assert_eq!(course.name, "Physics");
        assert_eq!(course.instructor, None);
        assert_eq!(
            tracker.get_course(&course.id, None).await.unwrap().as_ref(),
            Some(&course)
        );
        assert_eq!(tracker.get_course(&course.id, Some("bob")).await.unwrap(), None);
        assert_eq!(tracker.list_courses(None).await.unwrap(), vec![course]);
    }

    #[tokio::test]
    async fn create_task_validates_input() {
        let tracker = tracker_over(temp_storage().await).await;

        let missing = tracker
            .create_task(NewTask {
                title: Some("HW".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            missing.validation_message(),
            Some("courseId and title are required")
        );

        let bad_date = tracker
            .create_task(NewTask {
                course_id: Some("course-1".into()),
                title: Some("HW".into()),
                due_date: Some("next week".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(bad_date.validation_message().is_some());

        let task = tracker
            .create_task(NewTask {
                course_id: Some("course-1".into()),
                title: Some("HW".into()),
                due_date: Some(" 2025-12-01 ".into()),
                kind: Some("quiz".into()),
                weight: Some(10.0),
            })
            .await
            .unwrap();
        assert_eq!(task.due_date.as_deref(), Some("2025-12-01"));
        assert_eq!(task.kind.as_deref(), Some("Quiz"));
    }

    #[tokio::test]
    async fn delete_task_needs_course_and_is_idempotent() {
        let tracker = tracker_over(temp_storage().await).await;
        let course = seed_course(&tracker, "Art", 1).await;
        let task = tracker.list_tasks(Some(course.id.as_str())).await.unwrap().remove(0);

        assert!(tracker.delete_task(&task.id, None).await.unwrap_err().validation_message().is_some());
        assert!(tracker.delete_task(&task.id, Some(course.id.as_str())).await.unwrap());
        assert!(!tracker.delete_task(&task.id, Some(course.id.as_str())).await.unwrap());
    }

    #[tokio::test]
    async fn cascade_with_no_tasks() {
        let tracker = tracker_over(temp_storage().await).await;
        let course = seed_course(&tracker, "Empty", 0).await;

        let report = tracker.delete_course_cascade(&course.id, None).await.unwrap();
        assert_eq!(
            report,
            CascadeReport {
                course_deleted: true,
                tasks_deleted: 0,
                tasks_failed: 0
            }
        );
        assert!(tracker.list_courses(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cascade_removes_only_that_course_tasks() {
        let tracker = tracker_over(temp_storage().await).await;
        let doomed = seed_course(&tracker, "Doomed", 3).await;
        let kept = seed_course(&tracker, "Kept", 2).await;

        let report = tracker.delete_course_cascade(&doomed.id, None).await.unwrap();
        assert_eq!(report.tasks_deleted, 3);
        assert_eq!(report.tasks_failed, 0);

        let remaining = tracker.list_tasks(None).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|t| t.course_id == kept.id));
    }

    #[tokio::test]
    async fn cascade_falls_back_when_batch_rejected() {
        let tracker = tracker_over(FaultyStore::new(temp_storage().await).reject_batch()).await;
        let course = seed_course(&tracker, "History", 3).await;

        let report = tracker.delete_course_cascade(&course.id, None).await.unwrap();
        assert_eq!(report.tasks_deleted, 3);
        assert_eq!(report.tasks_failed, 0);
        assert!(tracker.list_tasks(Some(course.id.as_str())).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cascade_fallback_continues_past_failures() {
        // Seed through the plain store, then wrap it with a failing delete
        let storage = temp_storage().await;
        let course = Course {
            id: new_course_id(),
            user_id: DEFAULT_USER_ID.into(),
            name: "Chemistry".into(),
            instructor: None,
            semester: None,
            task_count: 3,
            source_blob: None,
        };
        storage.create_course(&course).await.unwrap();
        let mut ids = Vec::new();
        for title in ["Lab 1", "Lab 2", "Lab 3"] {
            let task = Task {
                id: new_task_id(),
                course_id: course.id.clone(),
                title: title.into(),
                due_date: None,
                kind: None,
                weight: None,
            };
            storage.create_task(&task).await.unwrap();
            ids.push(task.id);
        }

        let store = FaultyStore::new(storage).reject_batch().fail_delete_of(&ids[1]);
        let tracker = tracker_over(store).await;

        let report = tracker.delete_course_cascade(&course.id, None).await.unwrap();
        assert_eq!(
            report,
            CascadeReport {
                course_deleted: true,
                tasks_deleted: 2,
                tasks_failed: 1
            }
        );
        let left = tracker.list_tasks(Some(course.id.as_str())).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, ids[1]);
    }

    #[tokio::test]
    async fn upload_assigns_name_and_fires_trigger() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let tracker = tracker_over(temp_storage().await)
            .await
            .with_trigger(IngestTrigger::from_sender(tx));

        let name = tracker
            .upload_document(b"%PDF-1.4 fake", Some("Syllabus.PDF"))
            .await
            .unwrap();
        assert!(name.ends_with(".pdf"));
        assert_eq!(tracker.blobs().get(&name).await.unwrap(), b"%PDF-1.4 fake");
        assert_eq!(rx.recv().await, Some(IngestEvent::DocumentUploaded { name }));

        let plain = tracker.store_document(b"notes", Some("notes.txt")).await.unwrap();
        assert!(plain.ends_with(".txt"));
        let unnamed = tracker.store_document(b"x", None).await.unwrap();
        assert!(unnamed.ends_with(".pdf"));

        assert!(tracker.upload_document(b"", None).await.unwrap_err().validation_message().is_some());
    }

    #[tokio::test]
    async fn insights_scoped_to_user() {
        let tracker = tracker_over(temp_storage().await).await;
        let course = seed_course(&tracker, "Mine", 0).await;
        tracker
            .create_task(NewTask {
                course_id: Some(course.id.clone()),
                title: Some("Essay".into()),
                due_date: Some("2025-12-15".into()),
                kind: Some("Paper".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        tracker
            .create_course(NewCourse {
                user_id: Some("someone-else".into()),
                course_name: Some("Theirs".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 12, 12).unwrap();
        let view = tracker.insights(None, today, 5).await.unwrap();
        assert_eq!(view.total_courses, 1);
        assert_eq!(view.kpis.due_next_7, 1);
        assert_eq!(view.upcoming[0].title, "Essay");
    }

    #[tokio::test]
    async fn other_users_tasks_are_not_orphans() {
        let tracker = tracker_over(temp_storage().await).await;
        seed_course(&tracker, "Mine", 1).await;
        let theirs = tracker
            .create_course(NewCourse {
                user_id: Some("bob".into()),
                course_name: Some("Theirs".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        for title in ["Lab 1", "Lab 2"] {
            tracker
                .create_task(NewTask {
                    course_id: Some(theirs.id.clone()),
                    title: Some(title.into()),
                    due_date: Some("2025-12-14".into()),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        // A task left behind by a course that no longer exists
        tracker
            .create_task(NewTask {
                course_id: Some("course-gone".into()),
                title: Some("Stray".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 12, 12).unwrap();
        let view = tracker.insights(None, today, 5).await.unwrap();
        assert_eq!(view.total_tasks, 1);
        assert_eq!(view.orphaned_tasks, 1);
        assert_eq!(view.kpis.due_next_7, 0);

        let bobs = tracker.insights(Some("bob"), today, 5).await.unwrap();
        assert_eq!(bobs.total_tasks, 2);
        assert_eq!(bobs.orphaned_tasks, 1);
        assert_eq!(bobs.kpis.due_next_7, 2);
    }

    #[test]
    fn upload_extension_rules() {
        assert_eq!(upload_extension(Some("a.PDF")), "pdf");
        assert_eq!(upload_extension(Some("notes.md")), "md");
        assert_eq!(upload_extension(Some("weird.ex/t")), "pdf");
        assert_eq!(upload_extension(Some("noext")), "pdf");
        assert_eq!(upload_extension(None), "pdf");
    }
}
