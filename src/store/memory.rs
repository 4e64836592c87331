//! In-memory log store
//!
//! Holds a fixed set of logs loaded at startup, either from a JSON seed file
//! or built in code. Used for local runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::{BuildloggerOptions, LogMetadata, LogPage, LogStore, StoreError};

/// Timestamp format of the `print_time` prefix.
const LINE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

/// One line of a stored log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: i32,
    pub data: String,
}

impl LogLine {
    fn render(&self, print_time: bool, print_priority: bool) -> String {
        let mut out = String::with_capacity(self.data.len() + 40);
        if print_priority {
            out.push_str(&format!("[P: {:>3}] ", self.priority));
        }
        if print_time {
            out.push_str(&format!("[{}] ", self.timestamp.format(LINE_TIME_FORMAT)));
        }
        out.push_str(&self.data);
        out.push('\n');
        out
    }
}

/// A log with its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLog {
    #[serde(flatten)]
    pub metadata: LogMetadata,
    #[serde(default)]
    pub lines: Vec<LogLine>,
}

/// Which locator fields a query filters on.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Id,
    TaskId,
    TestName,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    logs: Arc<Vec<StoredLog>>,
}

impl MemoryStore {
    pub fn new(logs: Vec<StoredLog>) -> Self {
        Self {
            logs: Arc::new(logs),
        }
    }

    /// Load logs from a JSON array of [`StoredLog`].
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read log seed file {}", path.display()))?;
        let logs: Vec<StoredLog> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse log seed file {}", path.display()))?;

        tracing::info!(logs = logs.len(), path = %path.display(), "Loaded log seed file");
        Ok(Self::new(logs))
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    fn select(&self, scope: Scope, opts: &BuildloggerOptions) -> Result<Vec<&StoredLog>, StoreError> {
        let mut matched: Vec<&StoredLog> = self
            .logs
            .iter()
            .filter(|log| matches_scope(log, scope, opts))
            .collect();

        // Without an explicit execution only the latest one is visible.
        if !matches!(scope, Scope::Id) && opts.execution.is_none() {
            if let Some(latest) = matched.iter().map(|log| log.metadata.info.execution).max() {
                matched.retain(|log| log.metadata.info.execution == latest);
            }
        }

        if matched.is_empty() {
            return Err(StoreError::NotFound(describe(scope, opts)));
        }
        matched.sort_by_key(|log| log.metadata.created_at);
        Ok(matched)
    }

    fn render(&self, logs: &[&StoredLog], opts: &BuildloggerOptions) -> LogPage {
        let mut lines: Vec<&LogLine> = logs
            .iter()
            .flat_map(|log| log.lines.iter())
            .filter(|line| opts.time_range.is_zero() || opts.time_range.contains(line.timestamp))
            .collect();
        lines.sort_by_key(|line| line.timestamp);

        if opts.limit > 0 {
            lines.truncate(opts.limit as usize);
        } else if opts.tail > 0 {
            let skip = lines.len().saturating_sub(opts.tail as usize);
            lines.drain(..skip);
        }

        let mut page = LogPage {
            next: opts.time_range.end_at,
            ..Default::default()
        };
        for (i, line) in lines.iter().enumerate() {
            if opts.soft_size_limit > 0 && page.data.len() >= opts.soft_size_limit {
                page.next = line.timestamp;
                page.paginated = true;
                tracing::debug!(returned = i, remaining = lines.len() - i, "Soft size limit reached");
                break;
            }
            page.data
                .extend_from_slice(line.render(opts.print_time, opts.print_priority).as_bytes());
        }
        page
    }

    fn page(&self, scope: Scope, opts: &BuildloggerOptions) -> Result<LogPage, StoreError> {
        let logs = self.select(scope, opts)?;
        Ok(self.render(&logs, opts))
    }

    fn metadata(&self, scope: Scope, opts: &BuildloggerOptions) -> Result<Vec<LogMetadata>, StoreError> {
        Ok(self
            .select(scope, opts)?
            .into_iter()
            .map(|log| log.metadata.clone())
            .collect())
    }
}

fn matches_scope(log: &StoredLog, scope: Scope, opts: &BuildloggerOptions) -> bool {
    let info = &log.metadata.info;
    match scope {
        Scope::Id => return log.metadata.id == opts.id,
        Scope::TaskId => {
            if !opts.process_name.is_empty() && info.proc_name != opts.process_name {
                return false;
            }
        }
        Scope::TestName => {
            if info.test_name != opts.test_name {
                return false;
            }
        }
    }

    info.task_id == opts.task_id
        && opts.execution.map_or(true, |e| info.execution == e)
        && opts.tags.iter().all(|tag| info.tags.contains(tag))
}

fn describe(scope: Scope, opts: &BuildloggerOptions) -> String {
    match scope {
        Scope::Id => format!("log '{}'", opts.id),
        Scope::TaskId => format!("logs with task id '{}'", opts.task_id),
        Scope::TestName => format!(
            "logs with task id '{}' and test name '{}'",
            opts.task_id, opts.test_name
        ),
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn find_log_by_id(&self, opts: &BuildloggerOptions) -> Result<LogPage, StoreError> {
        self.page(Scope::Id, opts)
    }

    async fn find_log_metadata_by_id(&self, id: &str) -> Result<LogMetadata, StoreError> {
        self.logs
            .iter()
            .find(|log| log.metadata.id == id)
            .map(|log| log.metadata.clone())
            .ok_or_else(|| StoreError::NotFound(format!("log '{id}'")))
    }

    async fn find_logs_by_task_id(&self, opts: &BuildloggerOptions) -> Result<LogPage, StoreError> {
        self.page(Scope::TaskId, opts)
    }

    async fn find_log_metadata_by_task_id(
        &self,
        opts: &BuildloggerOptions,
    ) -> Result<Vec<LogMetadata>, StoreError> {
        self.metadata(Scope::TaskId, opts)
    }

    async fn find_logs_by_test_name(
        &self,
        opts: &BuildloggerOptions,
    ) -> Result<LogPage, StoreError> {
        self.page(Scope::TestName, opts)
    }

    async fn find_log_metadata_by_test_name(
        &self,
        opts: &BuildloggerOptions,
    ) -> Result<Vec<LogMetadata>, StoreError> {
        self.metadata(Scope::TestName, opts)
    }

    async fn find_grouped_logs(&self, opts: &BuildloggerOptions) -> Result<LogPage, StoreError> {
        self.page(Scope::TestName, opts)
    }
}
