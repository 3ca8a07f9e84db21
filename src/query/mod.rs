//! Query execution boundary.
//!
//! The gate decides *whether* a query runs; a `QueryExecutor` runs it.
//! Executors receive control only after admission, together with the
//! remaining time budget and the request's cancellation token.

pub mod upstream;

use std::time::Duration;
use async_trait::async_trait;
use hyper::body::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::form_urlencoded;

use crate::admission::QueryBudget;

pub use upstream::UpstreamExecutor;

/// Request parameters, from the URL query and a form-encoded body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    params: Vec<(String, String)>,
}

impl LogQuery {
    /// Collect parameters. Body values come first, as they take precedence
    /// over URL values with the same name.
    pub fn from_parts(url_query: Option<&str>, form_body: &[u8]) -> Self {
        let params = form_urlencoded::parse(form_body)
            .chain(form_urlencoded::parse(url_query.unwrap_or_default().as_bytes()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { params }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The client-requested `timeout` parameter, raw.
    pub fn timeout(&self) -> Option<&str> {
        self.get("timeout")
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Replace every value for `key` with a single `value`.
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.retain(|(k, _)| k != key);
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Form-urlencoded representation.
    pub fn to_form(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish()
    }
}

/// Successful query output, passed through to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub content_type: String,
    pub body: Bytes,
}

/// Failures produced after admission.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query did not finish within its {:.3}s budget", .0.as_secs_f64())]
    DeadlineExceeded(Duration),

    #[error("query was cancelled")]
    Cancelled,

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
}

/// Runs admitted queries.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `query`, finishing within `budget` and stopping early once
    /// `cancel` fires.
    async fn execute(
        &self,
        query: LogQuery,
        budget: QueryBudget,
        cancel: CancellationToken,
    ) -> Result<QueryResponse, QueryError>;
}
