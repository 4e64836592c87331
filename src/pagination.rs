//! Pagination cursors for size-limited log responses
//!
//! Cursors are RFC3339 instants carried in the `start` query parameter. Each
//! link points back at the route that was called, with the caller's other
//! query parameters intact, so a client can replay the request from either
//! end of the returned slice.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::query::{PARAM_LIMIT, PARAM_START};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("page '{0}' has an empty key")]
    EmptyKey(String),
}

/// Format an instant as a cursor key.
pub fn cursor_key(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The request a set of page links replays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageRoute {
    /// Request path, joined onto the base url
    pub path: String,
    /// Query parameters other than the cursor and limit, in request order
    pub params: Vec<(String, String)>,
}

impl PageRoute {
    pub fn new(path: impl Into<String>, params: &[(String, String)]) -> Self {
        Self {
            path: path.into(),
            params: params
                .iter()
                .filter(|(k, _)| k != PARAM_START && k != PARAM_LIMIT)
                .cloned()
                .collect(),
        }
    }
}

/// One navigation descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub base_url: String,
    pub route: PageRoute,
    pub key_query_param: String,
    pub limit_query_param: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    pub relation: String,
}

impl Page {
    fn new(base_url: &str, route: &PageRoute, key: DateTime<Utc>, relation: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            route: route.clone(),
            key_query_param: PARAM_START.to_string(),
            limit_query_param: PARAM_LIMIT.to_string(),
            key: cursor_key(key),
            limit: None,
            relation: relation.to_string(),
        }
    }

    /// The replayable request location of this page.
    pub fn url(&self) -> Result<Url, PaginationError> {
        if self.key.is_empty() {
            return Err(PaginationError::EmptyKey(self.relation.clone()));
        }

        let mut url = Url::parse(&self.base_url).map_err(|e| PaginationError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(PaginationError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "not a hierarchical url".to_string(),
            });
        }

        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            self.route.path.trim_start_matches('/')
        );
        url.set_path(&path);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair(&self.key_query_param, &self.key);
            if let Some(limit) = self.limit.filter(|l| *l > 0) {
                query.append_pair(&self.limit_query_param, &limit.to_string());
            }
            for (key, value) in &self.route.params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Backward and forward cursors of a truncated result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationLinks {
    pub prev: Page,
    pub next: Page,
}

impl PaginationLinks {
    /// `start` is the start of the requested range, `next` the store's
    /// continuation instant.
    pub fn build(
        base_url: &str,
        route: &PageRoute,
        start: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> Result<Self, PaginationError> {
        let links = Self {
            prev: Page::new(base_url, route, start, "prev"),
            next: Page::new(base_url, route, next, "next"),
        };
        // Surface a bad base url now rather than when the header is written.
        links.link_header()?;
        Ok(links)
    }

    /// Render as an RFC 8288 `Link` header value.
    pub fn link_header(&self) -> Result<String, PaginationError> {
        let prev = self.prev.url()?;
        let next = self.next.url()?;
        Ok(format!(
            "<{}>; rel=\"{}\", <{}>; rel=\"{}\"",
            prev, self.prev.relation, next, self.next.relation
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, d, 0, 0, 0).unwrap()
    }

    fn task_route() -> PageRoute {
        PageRoute::new("/buildlogger/task_id/T1", &[])
    }

    #[test]
    fn test_cursor_key_is_rfc3339() {
        assert_eq!(cursor_key(day(2)), "2021-01-02T00:00:00Z");
        let with_nanos = day(2) + chrono::Duration::nanoseconds(1_500);
        assert_eq!(cursor_key(with_nanos), "2021-01-02T00:00:00Z");
    }

    #[test]
    fn test_build_links() {
        let links = PaginationLinks::build("https://logs.example.com", &task_route(), day(1), day(2)).unwrap();
        assert_eq!(links.prev.key, "2021-01-01T00:00:00Z");
        assert_eq!(links.next.key, "2021-01-02T00:00:00Z");
        assert_eq!(links.prev.relation, "prev");
        assert_eq!(links.next.key_query_param, "start");
        assert_eq!(links.next.limit_query_param, "limit");
        assert_eq!(links.prev.base_url, links.next.base_url);
    }

    #[test]
    fn test_link_header() {
        let links = PaginationLinks::build("https://logs.example.com", &task_route(), day(1), day(2)).unwrap();
        assert_eq!(
            links.link_header().unwrap(),
            "<https://logs.example.com/buildlogger/task_id/T1?start=2021-01-01T00%3A00%3A00Z>; rel=\"prev\", \
             <https://logs.example.com/buildlogger/task_id/T1?start=2021-01-02T00%3A00%3A00Z>; rel=\"next\""
        );
    }

    #[test]
    fn test_limit_is_carried_when_set() {
        let mut links = PaginationLinks::build("http://localhost:8080", &task_route(), day(1), day(2)).unwrap();
        links.next.limit = Some(50);
        let url = links.next.url().unwrap();
        assert_eq!(url.query(), Some("start=2021-01-02T00%3A00%3A00Z&limit=50"));
    }

    #[test]
    fn test_links_replay_the_request() {
        let params = vec![
            ("tags".to_string(), "a".to_string()),
            ("start".to_string(), "2021-01-01T00:00:00Z".to_string()),
            ("tags".to_string(), "b".to_string()),
            ("limit".to_string(), "5".to_string()),
            ("paginate".to_string(), "true".to_string()),
        ];
        let route = PageRoute::new("/buildlogger/task_id/T1", &params);
        assert_eq!(route.params.len(), 3);

        let links = PaginationLinks::build("https://logs.example.com", &route, day(1), day(2)).unwrap();
        assert_eq!(
            links.next.url().unwrap().as_str(),
            "https://logs.example.com/buildlogger/task_id/T1\
             ?start=2021-01-02T00%3A00%3A00Z&tags=a&tags=b&paginate=true"
        );
    }

    #[test]
    fn test_base_url_path_prefix_is_kept() {
        let links =
            PaginationLinks::build("https://example.com/rest/", &task_route(), day(1), day(2)).unwrap();
        assert_eq!(
            links.prev.url().unwrap().path(),
            "/rest/buildlogger/task_id/T1"
        );
    }

    #[test]
    fn test_invalid_base_url_fails() {
        let err = PaginationLinks::build("not a url", &task_route(), day(1), day(2)).unwrap_err();
        assert!(matches!(err, PaginationError::InvalidBaseUrl { .. }));

        let err = PaginationLinks::build("mailto:logs@example.com", &task_route(), day(1), day(2)).unwrap_err();
        assert!(matches!(err, PaginationError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_empty_key_fails() {
        let mut links = PaginationLinks::build("http://localhost:8080", &task_route(), day(1), day(2)).unwrap();
        links.prev.key.clear();
        assert_eq!(
            links.link_header().unwrap_err(),
            PaginationError::EmptyKey("prev".to_string())
        );
    }
}
