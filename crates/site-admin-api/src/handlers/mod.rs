//! Endpoint handlers.
//!
//! Handlers return [`Reply`] values (or a raw response for downloads) and
//! propagate unexpected failures as [`HandlerFault`]. The pipeline attaches
//! the request id and builds the envelope.

pub mod files;
pub mod info;
pub mod login;
pub mod status;

use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::storage::{ImageStore, InfoStore};
use crate::domain::{messages, Account, FaultReport, HandlerFault, Reply, ServiceInfoConfig, TokenCodec};

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub info: Arc<InfoStore>,
    pub images: Arc<ImageStore>,
    pub tokens: Arc<TokenCodec>,
    pub accounts: Arc<HashMap<String, Account>>,
    pub service: Arc<ServiceInfoConfig>,
}

impl IntoResponse for HandlerFault {
    fn into_response(self) -> Response {
        FaultReport::from_fault(&self).into_response()
    }
}

/// Reached only for paths the route registry knows but the router does not.
pub async fn fallback() -> Reply {
    Reply::error(messages::ROUTE_NOT_FOUND)
}
