//! Shared fixtures for this crate's tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use syllatrack_extraction::{GenerationRequest, TextGenerator};
use syllatrack_shared::{Course, Result, SyllatrackError, Task};
use syllatrack_storage::{BlobStore, DocumentStore, FsBlobStore, Storage};
use uuid::Uuid;

pub async fn temp_storage() -> Storage {
    let path = std::env::temp_dir().join(format!("st_core_{}.db", Uuid::now_v7()));
    Storage::open(&path).await.expect("open test db")
}

pub async fn temp_blobs() -> FsBlobStore {
    let blobs = FsBlobStore::new(std::env::temp_dir().join(format!("st_core_{}", Uuid::now_v7())));
    blobs.ensure_container().await.expect("create container");
    blobs
}

/// Returns a canned reply and counts calls.
pub struct FakeGenerator {
    reply: String,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Wraps [`Storage`] and injects failures into selected operations.
pub struct FaultyStore {
    inner: Storage,
    failing_titles: HashSet<String>,
    failing_deletes: HashSet<String>,
    reject_batch: bool,
}

impl FaultyStore {
    pub fn new(inner: Storage) -> Self {
        Self {
            inner,
            failing_titles: HashSet::new(),
            failing_deletes: HashSet::new(),
            reject_batch: false,
        }
    }

    /// `create_task` fails for tasks with this title.
    pub fn fail_task_titled(mut self, title: &str) -> Self {
        self.failing_titles.insert(title.to_string());
        self
    }

    /// `delete_task` fails for this task id.
    pub fn fail_delete_of(mut self, id: &str) -> Self {
        self.failing_deletes.insert(id.to_string());
        self
    }

    /// `delete_tasks_batch` always fails.
    pub fn reject_batch(mut self) -> Self {
        self.reject_batch = true;
        self
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn create_course(&self, course: &Course) -> Result<()> {
        self.inner.create_course(course).await
    }

    async fn get_course(&self, id: &str, user_id: &str) -> Result<Option<Course>> {
        self.inner.get_course(id, user_id).await
    }

    async fn list_courses(&self, user_id: &str) -> Result<Vec<Course>> {
        self.inner.list_courses(user_id).await
    }

    async fn course_ids(&self) -> Result<HashSet<String>> {
        self.inner.course_ids().await
    }

    async fn delete_course(&self, id: &str, user_id: &str) -> Result<bool> {
        self.inner.delete_course(id, user_id).await
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        if self.failing_titles.contains(&task.title) {
            return Err(SyllatrackError::Storage("injected write failure".into()));
        }
        self.inner.create_task(task).await
    }

    async fn list_tasks(&self, course_id: Option<&str>) -> Result<Vec<Task>> {
        self.inner.list_tasks(course_id).await
    }

    async fn delete_task(&self, id: &str, course_id: &str) -> Result<bool> {
        if self.failing_deletes.contains(id) {
            return Err(SyllatrackError::Storage("injected delete failure".into()));
        }
        self.inner.delete_task(id, course_id).await
    }

    async fn delete_tasks_batch(&self, course_id: &str, ids: &[String]) -> Result<usize> {
        if self.reject_batch {
            return Err(SyllatrackError::Storage("batch rejected".into()));
        }
        self.inner.delete_tasks_batch(course_id, ids).await
    }
}
