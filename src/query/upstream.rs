//! Forwarding admitted queries to a query node.
//!
//! # Responsibilities
//! - POST the query parameters to the node's query path
//! - Rewrite `timeout` to whatever budget is left after queueing
//! - Bound the call by that budget and abort on cancellation
//! - Pass the node's response through unchanged

use std::time::Duration;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, uri::InvalidUri, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio_util::sync::CancellationToken;

use crate::admission::QueryBudget;
use crate::config::UpstreamConfig;
use crate::query::{LogQuery, QueryError, QueryExecutor, QueryResponse};

/// Path of the query endpoint on the node.
pub const UPSTREAM_QUERY_PATH: &str = "/select/logsql/query";

/// Executes queries on a remote query node over HTTP.
#[derive(Debug, Clone)]
pub struct UpstreamExecutor {
    client: Client<HttpConnector, Body>,
    endpoint: Uri,
    max_response_bytes: usize,
}

impl UpstreamExecutor {
    pub fn new(config: &UpstreamConfig) -> Result<Self, InvalidUri> {
        let endpoint: Uri = format!("http://{}{}", config.address, UPSTREAM_QUERY_PATH).parse()?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            endpoint,
            max_response_bytes: config.max_response_bytes,
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    async fn forward(&self, form: String) -> Result<QueryResponse, QueryError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .map_err(|e| QueryError::Upstream(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| QueryError::Upstream(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/stream+json")
            .to_string();

        let body = axum::body::to_bytes(Body::new(response.into_body()), self.max_response_bytes)
            .await
            .map_err(|e| QueryError::Upstream(format!("cannot read response body: {e}")))?;

        if !status.is_success() {
            return Err(QueryError::UpstreamStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(QueryResponse { content_type, body })
    }
}

/// `timeout` value for the node: whole milliseconds with an explicit unit,
/// since the node reads a bare number as seconds and zero as "no limit".
/// `None` once less than a millisecond is left.
fn timeout_param(remaining: Duration) -> Option<String> {
    let ms = remaining.as_millis();
    (ms > 0).then(|| format!("{ms}ms"))
}

#[async_trait]
impl QueryExecutor for UpstreamExecutor {
    async fn execute(
        &self,
        query: LogQuery,
        budget: QueryBudget,
        cancel: CancellationToken,
    ) -> Result<QueryResponse, QueryError> {
        let remaining = budget.remaining();
        let Some(timeout) = timeout_param(remaining) else {
            return Err(QueryError::DeadlineExceeded(budget.effective()));
        };

        let form = query.with_param("timeout", timeout).to_form();

        tracing::debug!(
            endpoint = %self.endpoint,
            remaining_ms = remaining.as_millis() as u64,
            "Forwarding admitted query"
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(QueryError::Cancelled),
            result = tokio::time::timeout(remaining, self.forward(form)) => match result {
                Ok(response) => response,
                Err(_) => Err(QueryError::DeadlineExceeded(budget.effective())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_param_carries_unit() {
        assert_eq!(timeout_param(Duration::from_millis(4999)).as_deref(), Some("4999ms"));
        assert_eq!(timeout_param(Duration::from_micros(1500)).as_deref(), Some("1ms"));
        assert_eq!(timeout_param(Duration::from_secs(30)).as_deref(), Some("30000ms"));
    }

    #[test]
    fn sub_millisecond_budget_is_exhausted() {
        assert_eq!(timeout_param(Duration::from_micros(999)), None);
        assert_eq!(timeout_param(Duration::ZERO), None);
    }
}
