//! Buildlogger HTTP handlers
//!
//! - GET /buildlogger/{id}
//! - GET /buildlogger/{id}/meta
//! - GET /buildlogger/task_id/{task_id}
//! - GET /buildlogger/task_id/{task_id}/meta
//! - GET /buildlogger/test_name/{task_id}/{test_name}
//! - GET /buildlogger/test_name/{task_id}/{test_name}/meta
//! - GET /buildlogger/test_name/{task_id}/{test_name}/group/{group_id}

use axum::extract::{OriginalUri, Path, Query, State};
use axum::Json;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::AppError;
use crate::inference::resolve_group_range;
use crate::merge::merge_test_and_global;
use crate::pagination::PageRoute;
use crate::query::{resolve, Locator, QueryDescriptor, QueryParams, RequestShape};
use crate::response::BuildloggerResponse;
use crate::store::{LogMetadata, LogStore};

type RawQuery = Query<Vec<(String, String)>>;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared state for buildlogger handlers
#[derive(Clone)]
pub struct BuildloggerState {
    pub store: Arc<dyn LogStore>,
    /// Base location of pagination links
    pub base_url: Arc<str>,
    /// Deadline for a whole request, store calls included
    pub request_timeout: Duration,
}

impl BuildloggerState {
    pub fn new(store: Arc<dyn LogStore>, base_url: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// GET /buildlogger/{id}
pub async fn get_log_by_id(
    State(state): State<BuildloggerState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    Query(params): RawQuery,
) -> Result<BuildloggerResponse, AppError> {
    let started = Instant::now();
    let work = fetch_payload(&state, RequestShape::ById, Locator::by_id(id), uri.path(), params);
    let result = with_deadline(state.request_timeout, work).await;
    finish(RequestShape::ById, started, result)
}

/// GET /buildlogger/{id}/meta
pub async fn get_log_meta_by_id(
    State(state): State<BuildloggerState>,
    Path(id): Path<String>,
) -> Result<Json<LogMetadata>, AppError> {
    let started = Instant::now();
    let work = async {
        state
            .store
            .find_log_metadata_by_id(&id)
            .await
            .map(Json)
            .map_err(|e| AppError::store(format!("Error getting log metadata by id '{}'", id), e))
    };
    let result = with_deadline(state.request_timeout, work).await;
    finish(RequestShape::MetaById, started, result)
}

/// GET /buildlogger/task_id/{task_id}
///
/// Example: GET /buildlogger/task_id/T1?tags=a&tags=b&n=100
pub async fn get_logs_by_task_id(
    State(state): State<BuildloggerState>,
    OriginalUri(uri): OriginalUri,
    Path(task_id): Path<String>,
    Query(params): RawQuery,
) -> Result<BuildloggerResponse, AppError> {
    let started = Instant::now();
    let locator = Locator::by_task_id(task_id);
    let work = fetch_payload(&state, RequestShape::ByTaskId, locator, uri.path(), params);
    let result = with_deadline(state.request_timeout, work).await;
    finish(RequestShape::ByTaskId, started, result)
}

/// GET /buildlogger/task_id/{task_id}/meta
pub async fn get_log_meta_by_task_id(
    State(state): State<BuildloggerState>,
    Path(task_id): Path<String>,
    Query(params): RawQuery,
) -> Result<Json<Vec<LogMetadata>>, AppError> {
    let started = Instant::now();
    let work = async {
        let desc = resolve_request(RequestShape::MetaByTaskId, Locator::by_task_id(task_id), params)?;
        let opts = desc.to_options();
        state
            .store
            .find_log_metadata_by_task_id(&opts)
            .await
            .map(Json)
            .map_err(|e| {
                AppError::store(
                    format!("Error getting log metadata by task id '{}'", opts.task_id),
                    e,
                )
            })
    };
    let result = with_deadline(state.request_timeout, work).await;
    finish(RequestShape::MetaByTaskId, started, result)
}

/// GET /buildlogger/test_name/{task_id}/{test_name}
pub async fn get_logs_by_test_name(
    State(state): State<BuildloggerState>,
    OriginalUri(uri): OriginalUri,
    Path((task_id, test_name)): Path<(String, String)>,
    Query(params): RawQuery,
) -> Result<BuildloggerResponse, AppError> {
    let started = Instant::now();
    let locator = Locator::by_test_name(task_id, test_name);
    let work = fetch_payload(&state, RequestShape::ByTestName, locator, uri.path(), params);
    let result = with_deadline(state.request_timeout, work).await;
    finish(RequestShape::ByTestName, started, result)
}

/// GET /buildlogger/test_name/{task_id}/{test_name}/meta
///
/// Returns the test's metadata followed by the task's global (test-less) metadata.
pub async fn get_log_meta_by_test_name(
    State(state): State<BuildloggerState>,
    Path((task_id, test_name)): Path<(String, String)>,
    Query(params): RawQuery,
) -> Result<Json<Vec<LogMetadata>>, AppError> {
    let started = Instant::now();
    let work = async {
        let locator = Locator::by_test_name(task_id, test_name);
        let desc = resolve_request(RequestShape::MetaByTestName, locator, params)?;
        let merged = merge_test_and_global(state.store.as_ref(), &desc.to_options()).await?;
        Ok::<_, AppError>(Json(merged))
    };
    let result = with_deadline(state.request_timeout, work).await;
    finish(RequestShape::MetaByTestName, started, result)
}

/// GET /buildlogger/test_name/{task_id}/{test_name}/group/{group_id}
pub async fn get_log_group(
    State(state): State<BuildloggerState>,
    OriginalUri(uri): OriginalUri,
    Path((task_id, test_name, group_id)): Path<(String, String, String)>,
    Query(params): RawQuery,
) -> Result<BuildloggerResponse, AppError> {
    let started = Instant::now();
    let locator = Locator::group(task_id, test_name, group_id);
    let work = fetch_payload(&state, RequestShape::Group, locator, uri.path(), params);
    let result = with_deadline(state.request_timeout, work).await;
    finish(RequestShape::Group, started, result)
}

/// Run `work`, giving up once `limit` has elapsed. Dropping `work` abandons
/// any store call still in flight.
async fn with_deadline<T>(
    limit: Duration,
    work: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    tokio::time::timeout(limit, work)
        .await
        .unwrap_or_else(|_| Err(AppError::Timeout(limit)))
}

fn resolve_request(
    shape: RequestShape,
    locator: Locator,
    params: Vec<(String, String)>,
) -> Result<QueryDescriptor, AppError> {
    let desc = resolve(shape, locator, &QueryParams::new(params), Utc::now())?;
    tracing::debug!(
        endpoint = shape.endpoint(),
        task_id = ?desc.task_id,
        test_name = ?desc.test_name,
        tags = ?desc.tags,
        mode = ?desc.retrieval_mode,
        "Resolved buildlogger query"
    );
    Ok(desc)
}

/// Resolve, query the store and compose the raw-content response.
async fn fetch_payload(
    state: &BuildloggerState,
    shape: RequestShape,
    locator: Locator,
    path: &str,
    params: Vec<(String, String)>,
) -> Result<BuildloggerResponse, AppError> {
    let route = PageRoute::new(path, &params);
    let desc = resolve_request(shape, locator, params)?;
    let store = state.store.as_ref();
    let mut opts = desc.to_options();

    let page = match shape {
        RequestShape::ById => store.find_log_by_id(&opts).await.map_err(|e| {
            AppError::store(format!("Error getting log by id '{}'", opts.id), e)
        })?,
        RequestShape::ByTaskId => store.find_logs_by_task_id(&opts).await.map_err(|e| {
            AppError::store(format!("Error getting logs by task id '{}'", opts.task_id), e)
        })?,
        RequestShape::ByTestName => store.find_logs_by_test_name(&opts).await.map_err(|e| {
            AppError::store(format!("Error getting logs by test name '{}'", opts.test_name), e)
        })?,
        RequestShape::Group => {
            if desc.capabilities().supports_inference && opts.time_range.is_zero() {
                opts.time_range = resolve_group_range(store, &opts).await?;
            }
            store.find_grouped_logs(&opts).await.map_err(|e| {
                AppError::store(
                    format!(
                        "Error getting grouped logs with task_id/test_name/group_id '{}/{}/{}'",
                        opts.task_id,
                        opts.test_name,
                        desc.group_id.as_deref().unwrap_or_default()
                    ),
                    e,
                )
            })?
        }
        RequestShape::MetaById | RequestShape::MetaByTaskId | RequestShape::MetaByTestName => {
            return Err(AppError::InternalError(format!(
                "{} does not return log content",
                shape.endpoint()
            )));
        }
    };

    let response = BuildloggerResponse::compose(
        page,
        desc.range.start_at,
        desc.retrieval_mode,
        &state.base_url,
        &route,
    )?;
    if response.is_paginated() {
        crate::metrics::record_paginated(shape.endpoint());
    }
    Ok(response)
}

/// Record the outcome of a request and pass it through.
fn finish<T>(
    shape: RequestShape,
    started: Instant,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    let status = match &result {
        Ok(_) => 200,
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                tracing::warn!(endpoint = shape.endpoint(), error = %e, "Buildlogger request failed");
            } else {
                tracing::debug!(endpoint = shape.endpoint(), error = %e, "Buildlogger request rejected");
            }
            status.as_u16()
        }
    };
    crate::metrics::record_request(shape.endpoint(), status, started.elapsed());
    result
}
