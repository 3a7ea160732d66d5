//! Request pipeline.
//!
//! Every request passes through, in order:
//!
//! 1. request id allocation (on a blocking worker)
//! 2. body buffering and JSON parsing (skipped for binary routes)
//! 3. inbound content log record
//! 4. route check against the registry
//! 5. session token verification for non-public routes
//! 6. dispatch, with panics and handler faults caught at this boundary
//!
//! On the way out the handler's [`Reply`] becomes an [`Envelope`] carrying
//! the request id. Raw successful responses (file downloads) pass through.

use axum::{
    body::Body,
    http::{header, request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde_json::Value;
use site_telemetry::{CONTENT_TARGET, ERROR_TARGET};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{info_span, Instrument, Span};

use super::auth::session_token;
use crate::adapters::request_id::{CounterError, RequestIdSource};
use crate::domain::{
    messages, BodyMode, EnvelopeBuilder, FaultReport, Reply, RequestContext, RouteRegistry,
    TokenCodec,
};

struct PipelineShared {
    counter: Arc<dyn RequestIdSource>,
    tokens: Arc<TokenCodec>,
    routes: &'static RouteRegistry,
    max_json_body: usize,
}

/// Pipeline layer
#[derive(Clone)]
pub struct PipelineLayer {
    shared: Arc<PipelineShared>,
}

impl PipelineLayer {
    pub fn new(
        counter: Arc<dyn RequestIdSource>,
        tokens: Arc<TokenCodec>,
        routes: &'static RouteRegistry,
        max_json_body: usize,
    ) -> Self {
        Self {
            shared: Arc::new(PipelineShared {
                counter,
                tokens,
                routes,
                max_json_body,
            }),
        }
    }
}

impl<S> Layer<S> for PipelineLayer {
    type Service = PipelineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineService {
            inner,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Pipeline service
#[derive(Clone)]
pub struct PipelineService<S> {
    inner: S,
    shared: Arc<PipelineShared>,
}

impl<S> Service<Request<Body>> for PipelineService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let inner = self.inner.clone();
        let shared = Arc::clone(&self.shared);

        let span = info_span!(
            "api_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            request_id = tracing::field::Empty,
        );

        Box::pin(process(shared, inner, req).instrument(span))
    }
}

async fn process<S>(
    shared: Arc<PipelineShared>,
    mut inner: S,
    req: Request<Body>,
) -> Result<Response, S::Error>
where
    S: Service<Request<Body>, Response = Response> + Send,
    S::Future: Send,
{
    let started = Instant::now();
    let (mut parts, body) = req.into_parts();

    let mut ctx = match allocate(&shared).await {
        Ok(id) => RequestContext::from_parts(id, &parts, started),
        Err(e) => {
            let ctx = RequestContext::unallocated(&parts, started);
            tracing::error!(
                target: ERROR_TARGET,
                path = %ctx.path,
                error = %e,
                "request id allocation failed"
            );
            let report = FaultReport {
                summary: format!("CounterError:{}", e),
                detail: format!("{:?}", e),
            };
            return Ok(EnvelopeBuilder::fault(&report, &ctx).into_response());
        }
    };
    Span::current().record("request_id", ctx.request_id);

    let route = shared
        .routes
        .lookup(&parts.method, parts.uri.path())
        .copied();

    let body = match route.map(|r| r.body) {
        Some(BodyMode::Binary) => body,
        _ => match axum::body::to_bytes(body, shared.max_json_body).await {
            Ok(bytes) => {
                if is_json(&parts) {
                    ctx.parsed_body = serde_json::from_slice::<Value>(&bytes)
                        .ok()
                        .filter(|v| !v.is_null());
                }
                Body::from(bytes)
            }
            Err(e) => {
                log_inbound(&ctx);
                tracing::warn!(
                    target: ERROR_TARGET,
                    request_id = ctx.request_id,
                    path = %ctx.path,
                    error = %e,
                    "request body rejected"
                );
                return Ok(reply(Reply::error(messages::BODY_TOO_LARGE), &ctx));
            }
        },
    };

    log_inbound(&ctx);

    let Some(route) = route else {
        tracing::warn!(
            target: ERROR_TARGET,
            request_id = ctx.request_id,
            method = %parts.method,
            path = %ctx.path,
            "route not found"
        );
        return Ok(reply(Reply::error(messages::ROUTE_NOT_FOUND), &ctx));
    };

    if route.tier.requires_auth() {
        let verified = session_token(&parts.headers)
            .map(|token| shared.tokens.verify(token))
            .filter(|v| v.valid)
            .and_then(|v| v.identity);

        match verified {
            Some(identity) => {
                tracing::debug!(request_id = ctx.request_id, client = %identity, "session verified");
                ctx.identity = Some(identity);
            }
            None => {
                tracing::warn!(
                    target: ERROR_TARGET,
                    request_id = ctx.request_id,
                    path = %ctx.path,
                    request_ip = %ctx.client_addr,
                    "session token missing or invalid"
                );
                return Ok(reply(Reply::auth_expired(), &ctx));
            }
        }
    }

    parts.extensions.insert(ctx.clone());
    let req = Request::from_parts(parts, body);

    let response = match AssertUnwindSafe(inner.call(req)).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(e),
        Err(panic) => return Ok(fault(&FaultReport::from_panic(panic), &ctx)),
    };

    Ok(finish(response, &ctx))
}

async fn allocate(shared: &PipelineShared) -> Result<u64, CounterError> {
    let counter = Arc::clone(&shared.counter);
    tokio::task::spawn_blocking(move || counter.next())
        .await
        .map_err(|e| CounterError::Worker(e.to_string()))?
}

fn is_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn log_inbound(ctx: &RequestContext) {
    tracing::info!(
        target: CONTENT_TARGET,
        request_id = ctx.request_id,
        kind = "request_in",
        request_path = %ctx.path,
        request_ip = %ctx.client_addr,
        request_url = %ctx.url,
        received_at = %ctx.received_at.to_rfc3339(),
        request_body = %ctx.body(),
    );
}

fn reply(reply: Reply, ctx: &RequestContext) -> Response {
    EnvelopeBuilder::build(reply, ctx).into_response()
}

fn fault(report: &FaultReport, ctx: &RequestContext) -> Response {
    tracing::error!(
        target: ERROR_TARGET,
        request_id = ctx.request_id,
        path = %ctx.path,
        summary = %report.summary,
        detail = %report.detail,
        "handler fault"
    );
    EnvelopeBuilder::fault(report, ctx).into_response()
}

/// Convert the handler's response into the outgoing one.
fn finish(mut response: Response, ctx: &RequestContext) -> Response {
    if let Some(report) = response.extensions_mut().remove::<FaultReport>() {
        return fault(&report, ctx);
    }
    if let Some(r) = response.extensions_mut().remove::<Reply>() {
        return reply(r, ctx);
    }

    let status = response.status();
    if status.is_success() {
        EnvelopeBuilder::record_passthrough(ctx);
        return response;
    }

    // Extractor rejections and the like
    tracing::warn!(
        target: ERROR_TARGET,
        request_id = ctx.request_id,
        path = %ctx.path,
        status = %status,
        "request rejected before the handler ran"
    );
    let msg = if status == StatusCode::PAYLOAD_TOO_LARGE {
        messages::BODY_TOO_LARGE.to_string()
    } else {
        status
            .canonical_reason()
            .unwrap_or("bad request")
            .to_lowercase()
    };
    reply(Reply::error(msg), ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::request_id::MemoryRequestCounter;
    use crate::domain::{paths, HandlerFault, ROUTE_REGISTRY};
    use axum::routing::{get, post};
    use axum::{Extension, Router};
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    struct BrokenCounter;

    impl RequestIdSource for BrokenCounter {
        fn next(&self) -> Result<u64, CounterError> {
            Err(CounterError::Exhausted)
        }
    }

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(b"pipeline-secret", Duration::from_secs(3600)).unwrap())
    }

    fn app_with(counter: Arc<dyn RequestIdSource>, max_json_body: usize) -> Router {
        Router::new()
            .route(paths::STATUS, get(|| async { Reply::ok("fine") }))
            .route(
                paths::LOGIN,
                post(|Extension(ctx): Extension<RequestContext>| async move {
                    Reply::ok("echo").with_data(ctx.body())
                }),
            )
            .route(
                paths::GET_INFO,
                post(|Extension(ctx): Extension<RequestContext>| async move {
                    Reply::ok("who").with_data(json!(ctx.identity))
                }),
            )
            .route(
                paths::SAVE,
                post(|| async {
                    if true {
                        panic!("disk on fire");
                    }
                    Reply::ok("unreachable")
                }),
            )
            .route(
                paths::UPLOAD,
                post(|| async {
                    Err::<Reply, _>(HandlerFault::from(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "no space left",
                    )))
                }),
            )
            .route(paths::DOWNLOAD, post(|| async { b"raw-bytes".to_vec() }))
            .layer(PipelineLayer::new(
                counter,
                codec(),
                &ROUTE_REGISTRY,
                max_json_body,
            ))
    }

    fn app() -> Router {
        app_with(Arc::new(MemoryRequestCounter::default()), 1024)
    }

    fn post_json(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn envelope(response: Response) -> Value {
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_public_route_gets_envelope() {
        let response = app()
            .oneshot(Request::get(paths::STATUS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = envelope(response).await;
        assert_eq!(
            body,
            json!({"code": 1000, "data": "", "msg": "fine", "msg_level": "ok", "request_id": 1})
        );
    }

    #[tokio::test]
    async fn test_json_body_reaches_handler() {
        let response = app()
            .oneshot(post_json(paths::LOGIN, r#"{"client_name":"admin"}"#))
            .await
            .unwrap();
        assert_eq!(envelope(response).await["data"], json!({"client_name": "admin"}));
    }

    #[tokio::test]
    async fn test_malformed_or_untyped_body_is_absent() {
        let response = app()
            .oneshot(post_json(paths::LOGIN, "{not json"))
            .await
            .unwrap();
        assert_eq!(envelope(response).await["data"], json!({}));

        let untyped = Request::post(paths::LOGIN)
            .body(Body::from(r#"{"client_name":"admin"}"#))
            .unwrap();
        let response = app().oneshot(untyped).await.unwrap();
        assert_eq!(envelope(response).await["data"], json!({}));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let big = format!(r#"{{"pad":"{}"}}"#, "x".repeat(2048));
        let response = app().oneshot(post_json(paths::LOGIN, &big)).await.unwrap();
        let body = envelope(response).await;
        assert_eq!(body["code"], 1001);
        assert_eq!(body["msg"], "request body too large");
    }

    #[tokio::test]
    async fn test_unknown_route_and_wrong_method() {
        let response = app()
            .oneshot(post_json("/api/does_not_exist", "{}"))
            .await
            .unwrap();
        let body = envelope(response).await;
        assert_eq!(body["code"], 1001);
        assert_eq!(body["msg"], "route not found");

        let response = app()
            .oneshot(Request::get(paths::LOGIN).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(envelope(response).await["msg"], "route not found");
    }

    #[tokio::test]
    async fn test_session_route_requires_token() {
        let response = app()
            .oneshot(post_json(paths::GET_INFO, "{}"))
            .await
            .unwrap();
        let body = envelope(response).await;
        assert_eq!(body["code"], 1002);
        assert_eq!(body["msg"], "session expired, please log in again");
        assert!(body.get("msg_level").is_none());

        let mut forged = post_json(paths::GET_INFO, "{}");
        forged
            .headers_mut()
            .insert(header::COOKIE, "token=bogus.token".parse().unwrap());
        let body = envelope(app().oneshot(forged).await.unwrap()).await;
        assert_eq!(body["code"], 1002);
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let token = codec().issue("admin");
        let mut req = post_json(paths::GET_INFO, "{}");
        req.headers_mut().insert(
            header::COOKIE,
            format!("token={}", token).parse().unwrap(),
        );

        let body = envelope(app().oneshot(req).await.unwrap()).await;
        assert_eq!(body["code"], 1000);
        assert_eq!(body["data"], "admin");
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let mut req = post_json(paths::SAVE, "{}");
        req.headers_mut().insert(
            header::COOKIE,
            format!("token={}", codec().issue("admin")).parse().unwrap(),
        );

        let body = envelope(app().oneshot(req).await.unwrap()).await;
        assert_eq!(body["code"], 1001);
        assert_eq!(body["msg_level"], "error");
        assert_eq!(
            body["msg"],
            "internal error||panic:disk on fire||request id: 1"
        );
    }

    #[tokio::test]
    async fn test_handler_fault_becomes_internal_error() {
        let mut req = Request::post(paths::UPLOAD).body(Body::empty()).unwrap();
        req.headers_mut().insert(
            header::COOKIE,
            format!("token={}", codec().issue("admin")).parse().unwrap(),
        );

        let body = envelope(app().oneshot(req).await.unwrap()).await;
        assert_eq!(
            body["msg"],
            "internal error||IoError:no space left||request id: 1"
        );
    }

    #[tokio::test]
    async fn test_raw_response_passes_through() {
        let mut req = post_json(paths::DOWNLOAD, "{}");
        req.headers_mut().insert(
            header::COOKIE,
            format!("token={}", codec().issue("admin")).parse().unwrap(),
        );

        let response = app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"raw-bytes");
    }

    #[tokio::test]
    async fn test_allocation_failure_reports_request_id_zero() {
        let response = app_with(Arc::new(BrokenCounter), 1024)
            .oneshot(Request::get(paths::STATUS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = envelope(response).await;
        assert_eq!(body["code"], 1001);
        assert_eq!(body["request_id"], 0);
        assert!(body["msg"]
            .as_str()
            .unwrap()
            .starts_with("internal error||CounterError:"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_get_unique_ids() {
        let app = app();
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move {
                    let response = app
                        .oneshot(Request::get(paths::STATUS).body(Body::empty()).unwrap())
                        .await
                        .unwrap();
                    envelope(response).await["request_id"].as_u64().unwrap()
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=50).collect::<Vec<_>>());
    }
}
