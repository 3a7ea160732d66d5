//! Site Admin API - backend for a single-site administration panel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    SITE ADMIN API                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  Cors                                                    │
//! │  Pipeline                                                │
//! │    request id ─→ body ─→ content log ─→ route ─→ session │
//! │  Handlers                                                │
//! │    status · login · get_info · save · download · upload  │
//! │  Envelope  {code, data, msg, msg_level, request_id}      │
//! └──────────────────────────────────────────────────────────┘
//!          │                    │                   │
//!   request_id.json      home_info.json     *_images/ dirs
//! ```
//!
//! # Access Tiers
//!
//! - **Public**: `GET /api/status`, `POST /api/login`
//! - **Session**: everything else, via a signed `token` cookie
//!
//! Every envelope is sent with HTTP 200; the outcome is in `code`
//! (1000 ok, 1001 error, 1002 session expired).
//!
//! # Usage
//!
//! ```ignore
//! use site_admin_api::{AdminApiService, AdminConfig};
//!
//! let service = AdminApiService::new(AdminConfig::load()?)?;
//! service.serve_with_shutdown(shutdown_signal).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod service;

pub use adapters::{FileRequestCounter, MemoryRequestCounter, RequestIdSource};
pub use domain::{
    AdminConfig, ConfigError, Envelope, HandlerFault, MsgLevel, Reply, ResponseCode, ServiceError,
    TokenCodec,
};
pub use service::AdminApiService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
