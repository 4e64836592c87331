//! Query resolution
//!
//! Turns the path variables and query string of a buildlogger request into a
//! validated [`QueryDescriptor`]. Every parameter is examined before failing,
//! so a request with several bad parameters reports all of them at once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::retrieval::RetrievalMode;
use crate::store::BuildloggerOptions;
use crate::time_range::TimeRange;

pub const PARAM_START: &str = "start";
pub const PARAM_END: &str = "end";
pub const PARAM_EXECUTION: &str = "execution";
pub const PARAM_PROC_NAME: &str = "proc_name";
pub const PARAM_TAGS: &str = "tags";
pub const PARAM_PRINT_TIME: &str = "print_time";
pub const PARAM_PRINT_PRIORITY: &str = "print_priority";
pub const PARAM_LIMIT: &str = "limit";
pub const PARAM_TAIL: &str = "n";
pub const PARAM_PAGINATE: &str = "paginate";

const TRUE_STRING: &str = "true";

/// Raw query string as an ordered multi-map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in request order.
    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// True iff the first value is exactly `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some(TRUE_STRING)
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::new(pairs)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A single malformed query parameter.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("invalid value '{value}' for parameter '{param}': {reason}")]
pub struct ParamError {
    pub param: String,
    pub value: String,
    pub reason: String,
}

impl ParamError {
    fn new(param: &str, value: &str, reason: impl ToString) -> Self {
        Self {
            param: param.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// All parameter errors of one request. Never empty.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{}", join_errors(.0))]
pub struct ParseErrors(Vec<ParamError>);

impl ParseErrors {
    /// `None` when there is nothing to report.
    pub fn from_vec(errors: Vec<ParamError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn errors(&self) -> &[ParamError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn join_errors(errors: &[ParamError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The buildlogger request shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestShape {
    ById,
    MetaById,
    ByTaskId,
    MetaByTaskId,
    ByTestName,
    MetaByTestName,
    Group,
}

/// Optional behaviors of a request shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `n` selects a tail count
    pub supports_tail: bool,
    /// Test-scoped metadata is merged with the global view
    pub supports_fanout: bool,
    /// A missing time range is inferred from metadata
    pub supports_inference: bool,
    /// `start`, `end`, `print_*`, `paginate` and `limit` are read
    pub parses_payload_params: bool,
    /// `proc_name` and `execution` are read
    pub parses_task_params: bool,
    /// `tags` is read
    pub parses_tags: bool,
}

impl RequestShape {
    pub const fn capabilities(self) -> Capabilities {
        let none = Capabilities {
            supports_tail: false,
            supports_fanout: false,
            supports_inference: false,
            parses_payload_params: false,
            parses_task_params: false,
            parses_tags: false,
        };
        match self {
            Self::ById => Capabilities {
                parses_payload_params: true,
                ..none
            },
            Self::MetaById => none,
            Self::ByTaskId => Capabilities {
                supports_tail: true,
                parses_payload_params: true,
                parses_task_params: true,
                parses_tags: true,
                ..none
            },
            Self::MetaByTaskId => Capabilities {
                parses_tags: true,
                ..none
            },
            Self::ByTestName => Capabilities {
                parses_payload_params: true,
                parses_tags: true,
                ..none
            },
            Self::MetaByTestName => Capabilities {
                supports_fanout: true,
                parses_tags: true,
                ..none
            },
            Self::Group => Capabilities {
                supports_inference: true,
                parses_payload_params: true,
                parses_tags: true,
                ..none
            },
        }
    }

    /// Stable name used in logs and metric labels.
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::ById => "log_by_id",
            Self::MetaById => "log_meta_by_id",
            Self::ByTaskId => "logs_by_task_id",
            Self::MetaByTaskId => "log_meta_by_task_id",
            Self::ByTestName => "logs_by_test_name",
            Self::MetaByTestName => "log_meta_by_test_name",
            Self::Group => "log_group",
        }
    }
}

/// Path variables identifying the log(s) a request targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locator {
    pub id: Option<String>,
    pub task_id: Option<String>,
    pub test_name: Option<String>,
    pub group_id: Option<String>,
}

impl Locator {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_task_id(task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            ..Default::default()
        }
    }

    pub fn by_test_name(task_id: impl Into<String>, test_name: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            test_name: Some(test_name.into()),
            ..Default::default()
        }
    }

    pub fn group(
        task_id: impl Into<String>,
        test_name: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            task_id: Some(task_id.into()),
            test_name: Some(test_name.into()),
            group_id: Some(group_id.into()),
            ..Default::default()
        }
    }
}

/// Canonical, validated form of a buildlogger request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub shape: RequestShape,
    pub id: Option<String>,
    pub task_id: Option<String>,
    pub test_name: Option<String>,
    pub group_id: Option<String>,
    pub tags: Vec<String>,
    pub process_name: Option<String>,
    pub execution: Option<i64>,
    pub range: TimeRange,
    pub print_time: bool,
    pub print_priority: bool,
    pub retrieval_mode: RetrievalMode,
}

impl QueryDescriptor {
    pub fn capabilities(&self) -> Capabilities {
        self.shape.capabilities()
    }

    /// Options for the store call this request maps to.
    pub fn to_options(&self) -> BuildloggerOptions {
        BuildloggerOptions {
            id: self.id.clone().unwrap_or_default(),
            task_id: self.task_id.clone().unwrap_or_default(),
            test_name: self.test_name.clone().unwrap_or_default(),
            execution: self.execution,
            process_name: self.process_name.clone().unwrap_or_default(),
            tags: self.tags.clone(),
            time_range: self.range,
            print_time: self.print_time,
            print_priority: self.print_priority,
            limit: self.retrieval_mode.limit(),
            tail: self.retrieval_mode.tail(),
            soft_size_limit: self.retrieval_mode.soft_size_limit(),
        }
    }
}

/// Resolve a request of the given shape.
///
/// `now` is the default upper bound of a time range that omits `end`.
pub fn resolve(
    shape: RequestShape,
    locator: Locator,
    params: &QueryParams,
    now: DateTime<Utc>,
) -> Result<QueryDescriptor, ParseErrors> {
    let caps = shape.capabilities();
    let mut errors = Vec::new();

    let mut tags = if caps.parses_tags {
        params.get_all(PARAM_TAGS)
    } else {
        Vec::new()
    };
    if shape == RequestShape::Group {
        if let Some(group_id) = &locator.group_id {
            tags.push(group_id.clone());
        }
    }

    let mut range = TimeRange::default();
    let mut print_time = false;
    let mut print_priority = false;
    let mut paginate = false;
    let mut limit = 0;
    if caps.parses_payload_params {
        print_time = params.flag(PARAM_PRINT_TIME);
        print_priority = params.flag(PARAM_PRINT_PRIORITY);
        paginate = params.flag(PARAM_PAGINATE);

        let has_bound =
            params.non_empty(PARAM_START).is_some() || params.non_empty(PARAM_END).is_some();
        if !caps.supports_inference || has_bound {
            range = parse_time_range(params, now, &mut errors);
        }
        limit = parse_int(params, PARAM_LIMIT, &mut errors).unwrap_or(0);
    }

    let mut process_name = None;
    let mut execution = None;
    if caps.parses_task_params {
        process_name = params.non_empty(PARAM_PROC_NAME).map(str::to_string);
        execution = parse_int(params, PARAM_EXECUTION, &mut errors);
    }

    let tail = if caps.supports_tail {
        parse_int(params, PARAM_TAIL, &mut errors).unwrap_or(0)
    } else {
        0
    };

    if let Some(errors) = ParseErrors::from_vec(errors) {
        return Err(errors);
    }

    Ok(QueryDescriptor {
        shape,
        id: locator.id,
        task_id: locator.task_id,
        test_name: locator.test_name,
        group_id: locator.group_id,
        tags,
        process_name,
        execution,
        range,
        print_time,
        print_priority,
        retrieval_mode: RetrievalMode::select(limit, tail, paginate, caps.supports_tail),
    })
}

fn parse_int(params: &QueryParams, key: &str, errors: &mut Vec<ParamError>) -> Option<i64> {
    let raw = params.get(key)?;
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(ParamError::new(key, raw, e));
            None
        }
    }
}

fn parse_instant(key: &str, raw: &str) -> Result<DateTime<Utc>, ParamError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ParamError::new(key, raw, format!("expected an RFC3339 timestamp: {e}")))
}

/// Missing `start` stays at the zero instant; missing `end` means `now`.
fn parse_time_range(
    params: &QueryParams,
    now: DateTime<Utc>,
    errors: &mut Vec<ParamError>,
) -> TimeRange {
    let mut range = TimeRange::new(TimeRange::zero_instant(), now);
    let mut bounds_ok = true;

    if let Some(raw) = params.non_empty(PARAM_START) {
        match parse_instant(PARAM_START, raw) {
            Ok(t) => range.start_at = t,
            Err(e) => {
                errors.push(e);
                bounds_ok = false;
            }
        }
    }
    if let Some(raw) = params.non_empty(PARAM_END) {
        match parse_instant(PARAM_END, raw) {
            Ok(t) => range.end_at = t,
            Err(e) => {
                errors.push(e);
                bounds_ok = false;
            }
        }
    }

    if bounds_ok && !range.is_valid() {
        errors.push(ParamError::new(
            PARAM_START,
            params.get(PARAM_START).unwrap_or_default(),
            "start must not be after end",
        ));
    }

    range
}
