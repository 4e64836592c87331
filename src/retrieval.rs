//! Retrieval mode selection
//!
//! A response is bounded by at most one of: an explicit line limit, a tail
//! count, or a soft byte-size cap that turns on cursor pagination.

use serde::Serialize;

/// Soft cap on a paginated response's serialized payload (10 MiB).
pub const SOFT_SIZE_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Unbounded single response
    #[default]
    None,
    /// First `n` lines
    ExplicitLimit(i64),
    /// Last `n` lines
    Tail(i64),
    /// Payload capped near this many bytes, continued through a cursor
    SoftSizeLimit(usize),
}

impl RetrievalMode {
    /// Pick the retrieval mode for a request.
    ///
    /// Precedence is fixed: a positive `limit` wins, then a positive `tail`
    /// (only where the endpoint supports tailing), then `paginate`.
    pub fn select(limit: i64, tail: i64, paginate: bool, supports_tail: bool) -> Self {
        if limit > 0 {
            Self::ExplicitLimit(limit)
        } else if supports_tail && tail > 0 {
            Self::Tail(tail)
        } else if paginate {
            Self::SoftSizeLimit(SOFT_SIZE_LIMIT)
        } else {
            Self::None
        }
    }

    pub fn is_paginated(&self) -> bool {
        matches!(self, Self::SoftSizeLimit(_))
    }

    pub fn limit(&self) -> i64 {
        match self {
            Self::ExplicitLimit(n) => *n,
            _ => 0,
        }
    }

    pub fn tail(&self) -> i64 {
        match self {
            Self::Tail(n) => *n,
            _ => 0,
        }
    }

    pub fn soft_size_limit(&self) -> usize {
        match self {
            Self::SoftSizeLimit(bytes) => *bytes,
            _ => 0,
        }
    }
}
