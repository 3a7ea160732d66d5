//! Middleware stack.
//!
//! Layer order: Request → Cors → Pipeline (id, body, route check, session) → Handler

pub mod auth;
pub mod cors;
pub mod pipeline;

pub use auth::{constant_time_compare, session_token, TOKEN_COOKIE};
pub use cors::create_cors_layer;
pub use pipeline::{PipelineLayer, PipelineService};
