//! Response codes and error types.
//!
//! API-level failures never use HTTP status codes: the client always gets a
//! 200 with the real status in the envelope `code`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::config::ConfigError;
use crate::adapters::request_id::CounterError;

/// Envelope status codes
pub mod codes {
    pub const OK: u16 = 1000;
    pub const ERROR: u16 = 1001;
    pub const AUTH_EXPIRED: u16 = 1002;
}

/// Status carried in every response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// Request succeeded
    Ok,
    /// Validation, not-found or internal failure
    Error,
    /// Session token missing, invalid or expired
    AuthExpired,
}

impl ResponseCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            ResponseCode::Ok => codes::OK,
            ResponseCode::Error => codes::ERROR,
            ResponseCode::AuthExpired => codes::AUTH_EXPIRED,
        }
    }

    pub const fn from_u16(code: u16) -> Option<Self> {
        match code {
            codes::OK => Some(ResponseCode::Ok),
            codes::ERROR => Some(ResponseCode::Error),
            codes::AUTH_EXPIRED => Some(ResponseCode::AuthExpired),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl Serialize for ResponseCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> Deserialize<'de> for ResponseCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u16::deserialize(deserializer)?;
        ResponseCode::from_u16(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown response code {}", code)))
    }
}

/// Unexpected failure inside a handler.
///
/// Expected conditions (missing fields, unknown accounts, absent files) are
/// returned as error replies instead. Anything here crosses the fault
/// boundary and becomes an internal-error envelope.
#[derive(Debug, thiserror::Error)]
pub enum HandlerFault {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl HandlerFault {
    /// Short type name used in the client-visible summary
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerFault::Io(_) => "IoError",
            HandlerFault::Json(_) => "JsonError",
            HandlerFault::Multipart(_) => "MultipartError",
        }
    }

    /// `Type:message` summary
    pub fn summary(&self) -> String {
        format!("{}:{}", self.kind(), self)
    }
}

/// Service-level errors (startup and serving, not per-request)
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request id record could not be opened
    #[error("request id counter error: {0}")]
    Counter(#[from] CounterError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server terminated with an I/O error
    #[error("server error: {0}")]
    Serve(String),
}
