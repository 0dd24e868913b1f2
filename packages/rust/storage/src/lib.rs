//! libSQL document storage and filesystem blob storage.
//!
//! The [`DocumentStore`] trait is the contract the pipeline and service layer
//! depend on: point lookup by `(id, partition key)`, create, delete-by-key, and
//! query-by-field. [`Storage`] implements it over a local libSQL database.
//! [`BlobStore`] covers uploaded syllabus documents; [`FsBlobStore`] keeps them
//! in a directory.

mod blob;
mod migrations;

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use syllatrack_shared::{Course, Result, SyllatrackError, Task};
use tokio::sync::Mutex;

pub use blob::{BlobStore, FsBlobStore};

/// Key-value document collections for courses and tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new course.
    async fn create_course(&self, course: &Course) -> Result<()>;

    /// Point lookup by id within a user's partition.
    async fn get_course(&self, id: &str, user_id: &str) -> Result<Option<Course>>;

    /// All courses owned by `user_id`, in creation order.
    async fn list_courses(&self, user_id: &str) -> Result<Vec<Course>>;

    /// Identifiers of every course, across all users.
    async fn course_ids(&self) -> Result<HashSet<String>>;

    /// Delete a course by key. Returns `false` when nothing matched.
    async fn delete_course(&self, id: &str, user_id: &str) -> Result<bool>;

    /// Insert a new task.
    async fn create_task(&self, task: &Task) -> Result<()>;

    /// Tasks for one course, or every task when `course_id` is `None`.
    async fn list_tasks(&self, course_id: Option<&str>) -> Result<Vec<Task>>;

    /// Delete a task by key. Returns `false` when nothing matched.
    async fn delete_task(&self, id: &str, course_id: &str) -> Result<bool>;

    /// Delete several tasks of one course as a single unit.
    ///
    /// Either every delete is applied or the call fails and none are.
    /// Returns the number of rows removed.
    async fn delete_tasks_batch(&self, course_id: &str, ids: &[String]) -> Result<usize>;
}

/// Primary storage handle wrapping a libSQL database.
///
/// Every caller shares one connection, so writes go through `writes` to keep
/// them out of an open batch transaction.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    writes: Mutex<()>,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SyllatrackError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            writes: Mutex::new(()),
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        SyllatrackError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

#[async_trait]
impl DocumentStore for Storage {
    async fn create_course(&self, course: &Course) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let _write = self.writes.lock().await;
        self.conn
            .execute(
                "INSERT INTO courses (id, user_id, name, instructor, semester, task_count, source_blob, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    course.id.as_str(),
                    course.user_id.as_str(),
                    course.name.as_str(),
                    course.instructor.as_deref(),
                    course.semester.as_deref(),
                    i64::from(course.task_count),
                    course.source_blob.as_deref(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_course(&self, id: &str, user_id: &str) -> Result<Option<Course>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, name, instructor, semester, task_count, source_blob
                 FROM courses WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_course(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn list_courses(&self, user_id: &str) -> Result<Vec<Course>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, name, instructor, semester, task_count, source_blob
                 FROM courses WHERE user_id = ?1 ORDER BY rowid",
                params![user_id],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_course(&row)?);
        }
        Ok(results)
    }

    async fn course_ids(&self) -> Result<HashSet<String>> {
        let mut rows = self
            .conn
            .query("SELECT id FROM courses", params![])
            .await
            .map_err(storage_err)?;

        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            ids.insert(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(ids)
    }

    async fn delete_course(&self, id: &str, user_id: &str) -> Result<bool> {
        let _write = self.writes.lock().await;
        let affected = self
            .conn
            .execute(
                "DELETE FROM courses WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let _write = self.writes.lock().await;
        self.conn
            .execute(
                "INSERT INTO tasks (id, course_id, title, due_date, kind, weight, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    task.id.as_str(),
                    task.course_id.as_str(),
                    task.title.as_str(),
                    task.due_date.as_deref(),
                    task.kind.as_deref(),
                    task.weight,
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn list_tasks(&self, course_id: Option<&str>) -> Result<Vec<Task>> {
        let mut rows = match course_id {
            Some(course_id) => self
                .conn
                .query(
                    "SELECT id, course_id, title, due_date, kind, weight
                     FROM tasks WHERE course_id = ?1 ORDER BY rowid",
                    params![course_id],
                )
                .await
                .map_err(storage_err)?,
            None => self
                .conn
                .query(
                    "SELECT id, course_id, title, due_date, kind, weight
                     FROM tasks ORDER BY rowid",
                    params![],
                )
                .await
                .map_err(storage_err)?,
        };

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_task(&row)?);
        }
        Ok(results)
    }

    async fn delete_task(&self, id: &str, course_id: &str) -> Result<bool> {
        let _write = self.writes.lock().await;
        let affected = self
            .conn
            .execute(
                "DELETE FROM tasks WHERE id = ?1 AND course_id = ?2",
                params![id, course_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    async fn delete_tasks_batch(&self, course_id: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        // Held until commit or rollback
        let _write = self.writes.lock().await;
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        let mut deleted = 0usize;

        for id in ids {
            let outcome = tx
                .execute(
                    "DELETE FROM tasks WHERE id = ?1 AND course_id = ?2",
                    params![id.as_str(), course_id],
                )
                .await;

            match outcome {
                Ok(n) => deleted += n as usize,
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(error = %rollback, "batch delete rollback failed");
                    }
                    return Err(SyllatrackError::Storage(format!(
                        "batch delete of {} tasks failed: {e}",
                        ids.len()
                    )));
                }
            }
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(deleted)
    }
}

fn storage_err(e: libsql::Error) -> SyllatrackError {
    SyllatrackError::Storage(e.to_string())
}

/// Convert a database row to a [`Course`].
fn row_to_course(row: &libsql::Row) -> Result<Course> {
    Ok(Course {
        id: row.get::<String>(0).map_err(storage_err)?,
        user_id: row.get::<String>(1).map_err(storage_err)?,
        name: row.get::<String>(2).map_err(storage_err)?,
        instructor: row.get::<String>(3).ok(),
        semester: row.get::<String>(4).ok(),
        task_count: row.get::<u32>(5).unwrap_or(0),
        source_blob: row.get::<String>(6).ok(),
    })
}

/// Convert a database row to a [`Task`].
fn row_to_task(row: &libsql::Row) -> Result<Task> {
    Ok(Task {
        id: row.get::<String>(0).map_err(storage_err)?,
        course_id: row.get::<String>(1).map_err(storage_err)?,
        title: row.get::<String>(2).map_err(storage_err)?,
        due_date: row.get::<String>(3).ok(),
        kind: row.get::<String>(4).ok(),
        weight: row.get::<f64>(5).ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllatrack_shared::{new_course_id, new_task_id};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("st_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn course(user_id: &str, name: &str) -> Course {
        Course {
            id: new_course_id(),
            user_id: user_id.into(),
            name: name.into(),
            instructor: None,
            semester: Some("Fall 2025".into()),
            task_count: 0,
            source_blob: None,
        }
    }

    fn task(course_id: &str, title: &str, due: Option<&str>) -> Task {
        Task {
            id: new_task_id(),
            course_id: course_id.into(),
            title: title.into(),
            due_date: due.map(String::from),
            kind: Some("Homework".into()),
            weight: Some(10.0),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("st_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn course_crud_respects_partition() {
        let storage = test_storage().await;
        let c = course("demo-user", "Compilers");
        storage.create_course(&c).await.expect("create course");

        let found = storage
            .get_course(&c.id, "demo-user")
            .await
            .expect("get course")
            .expect("course present");
        assert_eq!(found, c);

        // Wrong partition key misses
        assert!(storage.get_course(&c.id, "someone-else").await.unwrap().is_none());
        assert!(storage.list_courses("someone-else").await.unwrap().is_empty());

        assert_eq!(storage.list_courses("demo-user").await.unwrap().len(), 1);
        let theirs = course("someone-else", "Ethics");
        storage.create_course(&theirs).await.unwrap();
        assert_eq!(
            storage.course_ids().await.unwrap(),
            HashSet::from([c.id.clone(), theirs.id.clone()])
        );

        assert!(storage.delete_course(&c.id, "demo-user").await.unwrap());
        assert!(!storage.delete_course(&c.id, "demo-user").await.unwrap());
    }

    #[tokio::test]
    async fn tasks_query_by_course() {
        let storage = test_storage().await;
        let a = course("demo-user", "Databases");
        let b = course("demo-user", "Networks");
        storage.create_course(&a).await.unwrap();
        storage.create_course(&b).await.unwrap();

        let t1 = task(&a.id, "HW 1", Some("2025-09-10"));
        let t2 = task(&a.id, "Midterm", None);
        let t3 = task(&b.id, "Lab 1", Some("2025-09-12"));
        for t in [&t1, &t2, &t3] {
            storage.create_task(t).await.unwrap();
        }

        let for_a = storage.list_tasks(Some(a.id.as_str())).await.unwrap();
        assert_eq!(for_a, vec![t1.clone(), t2.clone()]);
        assert_eq!(for_a[1].due_date, None);

        let all = storage.list_tasks(None).await.unwrap();
        assert_eq!(all.len(), 3);

        assert!(storage.delete_task(&t3.id, &b.id).await.unwrap());
        assert!(!storage.delete_task(&t3.id, &b.id).await.unwrap());
        // Wrong partition key deletes nothing
        assert!(!storage.delete_task(&t1.id, &b.id).await.unwrap());
    }

    #[tokio::test]
    async fn batch_delete_removes_listed_tasks() {
        let storage = test_storage().await;
        let c = course("demo-user", "Algorithms");
        storage.create_course(&c).await.unwrap();

        let tasks: Vec<Task> = (0..3)
            .map(|i| task(&c.id, &format!("Problem set {i}"), None))
            .collect();
        for t in &tasks {
            storage.create_task(t).await.unwrap();
        }

        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let deleted = storage.delete_tasks_batch(&c.id, &ids).await.unwrap();
        assert_eq!(deleted, 3);
        assert!(storage.list_tasks(Some(c.id.as_str())).await.unwrap().is_empty());

        assert_eq!(storage.delete_tasks_batch(&c.id, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_batch_keeps_concurrent_writes() {
        let storage = test_storage().await;
        let c = course("demo-user", "Operating Systems");
        storage.create_course(&c).await.unwrap();

        let kept = task(&c.id, "Quiz 1", None);
        let locked = task(&c.id, "Locked", None);
        storage.create_task(&kept).await.unwrap();
        storage.create_task(&locked).await.unwrap();
        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER lock_tasks BEFORE DELETE ON tasks WHEN old.title = 'Locked'
                 BEGIN SELECT RAISE(ABORT, 'task is locked'); END;",
            )
            .await
            .unwrap();

        let other = course("bob", "Statistics");
        storage.create_course(&other).await.unwrap();
        let late = task(&other.id, "Report", None);

        let ids = vec![kept.id.clone(), locked.id.clone()];
        let (batch, write) = tokio::join!(
            storage.delete_tasks_batch(&c.id, &ids),
            storage.create_task(&late),
        );
        assert!(batch.is_err());
        write.unwrap();

        // Rolled back as a unit, and the concurrent insert survived
        assert_eq!(
            storage.list_tasks(Some(c.id.as_str())).await.unwrap(),
            vec![kept, locked]
        );
        assert_eq!(
            storage.list_tasks(Some(other.id.as_str())).await.unwrap(),
            vec![late]
        );
    }
}
