//! SQL migration definitions for the Syllatrack database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: courses, tasks",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Courses, partitioned by owning user
CREATE TABLE IF NOT EXISTS courses (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    instructor  TEXT,
    semester    TEXT,
    task_count  INTEGER NOT NULL DEFAULT 0,
    source_blob TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_courses_user_id ON courses(user_id);

-- Tasks, partitioned by owning course. No foreign key: cascade is
-- performed by the service layer and orphans must stay representable.
CREATE TABLE IF NOT EXISTS tasks (
    id         TEXT PRIMARY KEY,
    course_id  TEXT NOT NULL,
    title      TEXT NOT NULL,
    due_date   TEXT,
    kind       TEXT,
    weight     REAL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_course_id ON tasks(course_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
