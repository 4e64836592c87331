//! Time-range inference for grouped log queries
//!
//! A group request without `start`/`end` is served over the span of every
//! log in the group, computed from their metadata.

use crate::error::AppError;
use crate::store::{BuildloggerOptions, LogMetadata, LogStore};
use crate::time_range::TimeRange;

/// Fold log lifetimes into the range that covers them.
///
/// Zero entries yield the zero range.
pub fn infer_range(entries: &[LogMetadata]) -> TimeRange {
    entries.iter().fold(TimeRange::default(), |mut range, entry| {
        range.widen(entry.created_at, entry.completed_at);
        range
    })
}

/// Fetch the group's metadata and infer its range.
///
/// `opts` must carry the group's task id, test name and tags (group id included).
pub async fn resolve_group_range(
    store: &dyn LogStore,
    opts: &BuildloggerOptions,
) -> Result<TimeRange, AppError> {
    let entries = store
        .find_log_metadata_by_test_name(opts)
        .await
        .map_err(|e| {
            AppError::store(
                format!("Error getting log metadata by test name '{}'", opts.test_name),
                e,
            )
        })?;

    let range = infer_range(&entries);
    tracing::debug!(
        task_id = %opts.task_id,
        test_name = %opts.test_name,
        entries = entries.len(),
        start_at = %range.start_at,
        end_at = %range.end_at,
        "Inferred group time range"
    );
    Ok(range)
}
