//! Uniform response envelope.
//!
//! Handlers return a [`Reply`]; the pipeline owns the request context and
//! turns the reply into an [`Envelope`] on the way out via [`EnvelopeBuilder`].

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use site_telemetry::{CONTENT_TARGET, PERFORMANCE_TARGET};
use std::any::Any;

use super::context::{RequestContext, UNKNOWN};
use super::error::{HandlerFault, ResponseCode};

/// Client-visible messages
pub mod messages {
    pub const ROUTE_NOT_FOUND: &str = "route not found";
    pub const SESSION_EXPIRED: &str = "session expired, please log in again";
    pub const BODY_TOO_LARGE: &str = "request body too large";
    pub const JSON_REQUIRED: &str = "please upload json data";
    pub const MISSING_PARAMETERS: &str = "missing parameters";
    pub const ACCOUNT_NOT_FOUND: &str = "account does not exist";
    pub const WRONG_PASSWORD: &str = "wrong password";
    pub const LOGIN_OK: &str = "login successful";
    pub const STATUS_OK: &str = "server time fetched";
    pub const INFO_NOT_FOUND: &str = "home info not found";
    pub const INFO_OK: &str = "home info fetched";
    pub const SAVED: &str = "saved";
    pub const FILE_TYPE_REQUIRED: &str = "file type required";
    pub const INVALID_DOWNLOAD_TYPE: &str = "invalid download type";
    pub const FILENAME_REQUIRED: &str = "filename required";
    pub const FILE_NOT_FOUND: &str = "file not found";
    pub const FILE_REQUIRED: &str = "please upload a file";
    pub const FILE_EXTRACTION_FAILED: &str = "file extraction failed";
    pub const IMAGE_TYPE_REQUIRED: &str = "image type required";
    pub const INVALID_UPLOAD_TYPE: &str = "invalid upload type";
    pub const UPLOAD_OK: &str = "upload successful";
    pub const INTERNAL_ERROR: &str = "internal error";
}

/// Severity hint for the client UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgLevel {
    Ok,
    Error,
}

impl MsgLevel {
    /// Derived from the code. `AUTH_EXPIRED` carries no level.
    pub fn for_code(code: ResponseCode) -> Option<Self> {
        match code {
            ResponseCode::Ok => Some(MsgLevel::Ok),
            ResponseCode::Error => Some(MsgLevel::Error),
            ResponseCode::AuthExpired => None,
        }
    }
}

/// Response body sent for every request except a successful download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: ResponseCode,
    pub data: Value,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_level: Option<MsgLevel>,
    pub request_id: u64,
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Handler outcome before the request id is attached
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub code: ResponseCode,
    pub data: Value,
    pub msg: String,
}

impl Reply {
    pub fn new(code: ResponseCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            data: Value::String(String::new()),
            msg: msg.into(),
        }
    }

    pub fn ok(msg: impl Into<String>) -> Self {
        Self::new(ResponseCode::Ok, msg)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(ResponseCode::Error, msg)
    }

    pub fn auth_expired() -> Self {
        Self::new(ResponseCode::AuthExpired, messages::SESSION_EXPIRED)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Carried to the pipeline in the response extensions.
impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = Response::default();
        response.extensions_mut().insert(self);
        response
    }
}

/// Diagnostic for a handler fault or panic.
///
/// `summary` reaches the client; `detail` only goes to the error sink.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultReport {
    pub summary: String,
    pub detail: String,
}

impl FaultReport {
    pub fn from_fault(fault: &HandlerFault) -> Self {
        Self {
            summary: fault.summary(),
            detail: format!("{:?}", fault),
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self {
            summary: format!("panic:{}", message),
            detail: format!("handler panicked: {}", message),
        }
    }
}

impl IntoResponse for FaultReport {
    fn into_response(self) -> Response {
        let mut response = Response::default();
        response.extensions_mut().insert(self);
        response
    }
}

/// Turns replies into envelopes and writes the outbound log records.
pub struct EnvelopeBuilder;

impl EnvelopeBuilder {
    pub fn build(reply: Reply, ctx: &RequestContext) -> Envelope {
        let envelope = Envelope {
            msg_level: MsgLevel::for_code(reply.code),
            code: reply.code,
            data: reply.data,
            msg: reply.msg,
            request_id: ctx.request_id,
        };
        Self::record(&envelope, ctx);
        envelope
    }

    /// Generic internal-error envelope.
    pub fn fault(report: &FaultReport, ctx: &RequestContext) -> Envelope {
        let msg = format!(
            "{}||{}||request id: {}",
            messages::INTERNAL_ERROR,
            report.summary,
            ctx.request_id
        );
        Self::build(Reply::error(msg), ctx)
    }

    /// Performance record for a response that bypasses the envelope.
    pub fn record_passthrough(ctx: &RequestContext) {
        record_performance(ctx);
    }

    fn record(envelope: &Envelope, ctx: &RequestContext) {
        record_performance(ctx);
        let body = serde_json::to_string(envelope).unwrap_or_else(|_| UNKNOWN.to_string());
        tracing::info!(
            target: CONTENT_TARGET,
            request_id = ctx.request_id,
            kind = "request_out",
            envelope = %body,
        );
    }
}

fn record_performance(ctx: &RequestContext) {
    tracing::info!(
        target: PERFORMANCE_TARGET,
        request_id = ctx.request_id,
        request_path = %ctx.path,
        request_ip = %ctx.client_addr,
        request_ip_forwarded = %ctx.forwarded_for,
        request_handler_time_ms = ctx.elapsed_ms(),
    );
}
