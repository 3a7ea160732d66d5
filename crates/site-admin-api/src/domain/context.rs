//! Per-request context created at pipeline entry.

use axum::extract::ConnectInfo;
use axum::http::{header, request::Parts, HeaderMap};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::time::Instant;

/// Placeholder for request details that could not be extracted.
pub const UNKNOWN: &str = "--";

/// Ephemeral record owned by the handling of one request.
///
/// Attached to the request extensions before dispatch so handlers can read
/// the parsed body and the authenticated identity.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Allocated request id
    pub request_id: u64,
    /// Client name from a verified session token
    pub identity: Option<String>,
    /// Wall-clock arrival time
    pub received_at: DateTime<Utc>,
    /// Monotonic arrival time for handling-time measurement
    pub started: Instant,
    /// JSON body, absent when missing, malformed or not JSON
    pub parsed_body: Option<Value>,
    /// Request path
    pub path: String,
    /// Full request URL
    pub url: String,
    /// Peer IP address or `--`
    pub client_addr: String,
    /// `X-Forwarded-For` header or `--`
    pub forwarded_for: String,
}

impl RequestContext {
    /// Build the context from request parts.
    ///
    /// Every detail is extracted best-effort; anything missing becomes `--`.
    pub fn from_parts(request_id: u64, parts: &Parts, started: Instant) -> Self {
        Self {
            request_id,
            identity: None,
            received_at: Utc::now(),
            started,
            parsed_body: None,
            path: parts.uri.path().to_string(),
            url: full_url(parts),
            client_addr: client_addr(parts),
            forwarded_for: forwarded_for(&parts.headers),
        }
    }

    /// Context for a request whose id could not be allocated.
    pub fn unallocated(parts: &Parts, started: Instant) -> Self {
        Self::from_parts(0, parts, started)
    }

    /// Parsed body, or an empty object when there is none.
    pub fn body(&self) -> Value {
        self.parsed_body
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Milliseconds since the request entered the pipeline.
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

fn full_url(parts: &Parts) -> String {
    if parts.uri.scheme().is_some() {
        return parts.uri.to_string();
    }
    match parts
        .headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
    {
        Some(host) => format!("http://{}{}", host, parts.uri),
        None => parts.uri.to_string(),
    }
}

fn client_addr(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn forwarded_for(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::net::{IpAddr, Ipv4Addr};

    fn parts(req: Request<Body>) -> Parts {
        req.into_parts().0
    }

    #[test]
    fn test_missing_details_default_to_placeholder() {
        let p = parts(Request::builder().uri("/api/status").body(Body::empty()).unwrap());
        let ctx = RequestContext::from_parts(5, &p, Instant::now());

        assert_eq!(ctx.request_id, 5);
        assert_eq!(ctx.path, "/api/status");
        assert_eq!(ctx.url, "/api/status");
        assert_eq!(ctx.client_addr, UNKNOWN);
        assert_eq!(ctx.forwarded_for, UNKNOWN);
        assert_eq!(ctx.body(), serde_json::json!({}));
    }

    #[test]
    fn test_extracts_host_peer_and_forwarded() {
        let mut req = Request::builder()
            .uri("/api/save?draft=1")
            .header("host", "admin.example.com")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 4)),
            51234,
        )));

        let ctx = RequestContext::from_parts(1, &parts(req), Instant::now());
        assert_eq!(ctx.url, "http://admin.example.com/api/save?draft=1");
        assert_eq!(ctx.client_addr, "10.0.0.4");
        assert_eq!(ctx.forwarded_for, "203.0.113.9");
    }
}
