//! Outward-facing buildlogger responses

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::pagination::{PageRoute, PaginationLinks};
use crate::retrieval::RetrievalMode;
use crate::store::LogPage;

/// Raw log content plus optional pagination links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildloggerResponse {
    pub data: Vec<u8>,
    pub pages: Option<PaginationLinks>,
}

impl BuildloggerResponse {
    /// Wrap a store page. Links are attached only when the request was
    /// size-limited and the store actually cut the result short.
    ///
    /// `requested_start` is the start of the range the client asked for and
    /// `route` the request the links replay.
    pub fn compose(
        page: LogPage,
        requested_start: DateTime<Utc>,
        mode: RetrievalMode,
        base_url: &str,
        route: &PageRoute,
    ) -> Result<Self, AppError> {
        let pages = if mode.is_paginated() && page.paginated {
            let links = PaginationLinks::build(base_url, route, requested_start, page.next)
                .map_err(|e| AppError::Pagination(e.to_string()))?;
            Some(links)
        } else {
            None
        };

        Ok(Self {
            data: page.data,
            pages,
        })
    }

    pub fn is_paginated(&self) -> bool {
        self.pages.is_some()
    }
}

impl IntoResponse for BuildloggerResponse {
    fn into_response(self) -> Response {
        let link = match self.pages.as_ref().map(PaginationLinks::link_header).transpose() {
            Ok(link) => link,
            Err(e) => return AppError::Pagination(e.to_string()).into_response(),
        };

        let mut response = (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.data,
        )
            .into_response();

        if let Some(link) = link {
            match HeaderValue::from_str(&link) {
                Ok(value) => {
                    response.headers_mut().insert(header::LINK, value);
                }
                Err(e) => return AppError::Pagination(e.to_string()).into_response(),
            }
        }

        response
    }
}
