//! Request inspection.
//!
//! # Responsibilities
//! - Normalize `/select/...` paths
//! - Extract the identity used in admission logs (request ID, peer, URI)

use std::net::SocketAddr;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderName, Request},
};

use crate::admission::RequestIdentity;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Strip the `/select` prefix and collapse `//`.
///
/// Returns `None` for paths outside `/select/`.
pub fn select_subpath(path: &str) -> Option<String> {
    if !path.starts_with("/select/") {
        return None;
    }
    path.strip_prefix("/select").map(|rest| rest.replace("//", "/"))
}

/// Identity of the request for admission logs.
pub fn identity(request: &Request<Body>) -> RequestIdentity {
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    RequestIdentity {
        request_id,
        remote_addr,
        request_uri: request.uri().to_string(),
    }
}
