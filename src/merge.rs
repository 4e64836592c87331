//! Test-scoped + global metadata merge
//!
//! Metadata for a test name is served together with the task's "global"
//! logs, those not tied to any test. A missing global view is not an error.

use crate::error::AppError;
use crate::store::{BuildloggerOptions, LogMetadata, LogStore, StoreError};

/// Treat a not-found outcome as an empty result. Every other error passes through.
pub fn tolerate_not_found<T>(result: Result<Vec<T>, StoreError>) -> Result<Vec<T>, StoreError> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::debug!(error = %e, "Supplemental lookup found nothing");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Fetch metadata for `opts.test_name`, then for the global view, and
/// concatenate them (test-scoped first).
///
/// The global fetch is only issued once the test-scoped fetch succeeded.
pub async fn merge_test_and_global(
    store: &dyn LogStore,
    opts: &BuildloggerOptions,
) -> Result<Vec<LogMetadata>, AppError> {
    let context = || format!("Error getting log metadata by test name '{}'", opts.test_name);

    let mut merged = store
        .find_log_metadata_by_test_name(opts)
        .await
        .map_err(|e| AppError::store(context(), e))?;

    let global_opts = BuildloggerOptions {
        test_name: String::new(),
        ..opts.clone()
    };
    let global = store.find_log_metadata_by_test_name(&global_opts).await;
    if global.as_ref().is_err_and(StoreError::is_not_found) {
        crate::metrics::record_global_fallback();
    }
    let global = tolerate_not_found(global).map_err(|e| AppError::store(context(), e))?;

    merged.extend(global);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LogInfo, LogPage};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    fn meta(id: &str) -> LogMetadata {
        LogMetadata {
            id: id.to_string(),
            info: LogInfo::default(),
            created_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    /// Answers test-scoped and global metadata lookups from fixed results.
    struct Scripted {
        scoped: Result<Vec<LogMetadata>, StoreError>,
        global: Result<Vec<LogMetadata>, StoreError>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(
            scoped: Result<Vec<LogMetadata>, StoreError>,
            global: Result<Vec<LogMetadata>, StoreError>,
        ) -> Self {
            Self {
                scoped,
                global,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LogStore for Scripted {
        async fn find_log_by_id(&self, _: &BuildloggerOptions) -> Result<LogPage, StoreError> {
            unreachable!()
        }
        async fn find_log_metadata_by_id(&self, _: &str) -> Result<LogMetadata, StoreError> {
            unreachable!()
        }
        async fn find_logs_by_task_id(&self, _: &BuildloggerOptions) -> Result<LogPage, StoreError> {
            unreachable!()
        }
        async fn find_log_metadata_by_task_id(
            &self,
            _: &BuildloggerOptions,
        ) -> Result<Vec<LogMetadata>, StoreError> {
            unreachable!()
        }
        async fn find_logs_by_test_name(
            &self,
            _: &BuildloggerOptions,
        ) -> Result<LogPage, StoreError> {
            unreachable!()
        }
        async fn find_log_metadata_by_test_name(
            &self,
            opts: &BuildloggerOptions,
        ) -> Result<Vec<LogMetadata>, StoreError> {
            self.calls.lock().unwrap().push(opts.test_name.clone());
            if opts.test_name.is_empty() {
                self.global.clone()
            } else {
                self.scoped.clone()
            }
        }
        async fn find_grouped_logs(&self, _: &BuildloggerOptions) -> Result<LogPage, StoreError> {
            unreachable!()
        }
    }

    fn opts() -> BuildloggerOptions {
        BuildloggerOptions {
            task_id: "T1".to_string(),
            test_name: "test1".to_string(),
            tags: vec!["a".to_string()],
            ..Default::default()
        }
    }

    fn ids(entries: &[LogMetadata]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_tolerate_not_found() {
        let absorbed: Result<Vec<u8>, _> =
            tolerate_not_found(Err(StoreError::NotFound("x".to_string())));
        assert_eq!(absorbed, Ok(Vec::new()));

        let kept = tolerate_not_found(Ok(vec![1, 2]));
        assert_eq!(kept, Ok(vec![1, 2]));

        let failed: Result<Vec<u8>, _> =
            tolerate_not_found(Err(StoreError::Internal("boom".to_string())));
        assert_eq!(failed, Err(StoreError::Internal("boom".to_string())));
    }

    #[tokio::test]
    async fn test_scoped_then_global() {
        let store = Scripted::new(Ok(vec![meta("t1"), meta("t2")]), Ok(vec![meta("g1")]));
        let merged = merge_test_and_global(&store, &opts()).await.unwrap();
        assert_eq!(ids(&merged), vec!["t1", "t2", "g1"]);
        assert_eq!(*store.calls.lock().unwrap(), vec!["test1", ""]);
    }

    #[tokio::test]
    async fn test_global_not_found_returns_scoped_exactly() {
        let scoped = vec![meta("t1"), meta("t2")];
        let store = Scripted::new(Ok(scoped.clone()), Err(StoreError::NotFound("global".into())));
        let merged = merge_test_and_global(&store, &opts()).await.unwrap();
        assert_eq!(merged, scoped);
    }

    #[tokio::test]
    async fn test_global_failure_fails_the_call() {
        let store = Scripted::new(
            Ok(vec![meta("t1")]),
            Err(StoreError::Timeout("deadline exceeded".into())),
        );
        let err = merge_test_and_global(&store, &opts()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Store {
                source: StoreError::Timeout(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_scoped_failure_skips_global_fetch() {
        let store = Scripted::new(Err(StoreError::NotFound("test1".into())), Ok(vec![meta("g1")]));
        let err = merge_test_and_global(&store, &opts()).await.unwrap_err();
        assert!(err.to_string().contains("'test1'"));
        assert_eq!(*store.calls.lock().unwrap(), vec!["test1"]);
    }
}
