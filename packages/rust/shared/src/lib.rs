//! Shared types, error model, and configuration for Syllatrack.
//!
//! This crate is the foundation depended on by all other Syllatrack crates.
//! It provides:
//! - [`SyllatrackError`], the unified error type
//! - Domain types ([`Course`], [`Task`], [`TaskKind`])
//! - Due-date helpers ([`dates`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod dates;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_USER_ID, DefaultsConfig, LlmConfig, LlmProvider, ServerConfig,
    StorageConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key, validate_api_key,
};
pub use error::{Result, SyllatrackError};
pub use types::{
    COURSE_ID_PREFIX, Course, TASK_ID_PREFIX, Task, TaskKind, new_course_id, new_task_id,
};
