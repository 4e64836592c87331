//! Interface to the buildlogger log store
//!
//! The store owns log bytes and metadata. This layer only decides what to
//! ask for and how to present the answer.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time_range::TimeRange;

pub use memory::MemoryStore;

/// Errors returned by a [`LogStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("store error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Options passed to every store query.
///
/// An empty `test_name` on a test-name query selects logs not tied to any test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildloggerOptions {
    pub id: String,
    pub task_id: String,
    pub test_name: String,
    pub execution: Option<i64>,
    pub process_name: String,
    pub tags: Vec<String>,
    pub time_range: TimeRange,
    pub print_time: bool,
    pub print_priority: bool,
    pub limit: i64,
    pub tail: i64,
    pub soft_size_limit: usize,
}

/// A (possibly truncated) slice of merged log content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPage {
    pub data: Vec<u8>,
    /// Instant immediately following the last returned line
    pub next: DateTime<Utc>,
    /// Set when the soft size limit cut the result short
    pub paginated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogInfo {
    pub project: String,
    pub version: String,
    pub variant: String,
    pub task_name: String,
    pub task_id: String,
    pub execution: i64,
    pub test_name: String,
    pub proc_name: String,
    pub format: String,
    pub tags: Vec<String>,
    pub exit_code: i32,
    pub mainline: bool,
}

/// Metadata of a single stored log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetadata {
    pub id: String,
    #[serde(default)]
    pub info: LogInfo,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// The queries the buildlogger routes need from a store.
///
/// Implementations are expected to be cancel-safe: dropping a returned future
/// abandons the query.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn find_log_by_id(&self, opts: &BuildloggerOptions) -> Result<LogPage, StoreError>;

    async fn find_log_metadata_by_id(&self, id: &str) -> Result<LogMetadata, StoreError>;

    async fn find_logs_by_task_id(&self, opts: &BuildloggerOptions) -> Result<LogPage, StoreError>;

    async fn find_log_metadata_by_task_id(
        &self,
        opts: &BuildloggerOptions,
    ) -> Result<Vec<LogMetadata>, StoreError>;

    async fn find_logs_by_test_name(
        &self,
        opts: &BuildloggerOptions,
    ) -> Result<LogPage, StoreError>;

    async fn find_log_metadata_by_test_name(
        &self,
        opts: &BuildloggerOptions,
    ) -> Result<Vec<LogMetadata>, StoreError>;

    async fn find_grouped_logs(&self, opts: &BuildloggerOptions) -> Result<LogPage, StoreError>;
}
