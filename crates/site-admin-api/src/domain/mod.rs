//! Domain layer: configuration, envelope, routes and session tokens.

pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod routes;
pub mod token;

pub use config::{
    Account, AdminConfig, AuthConfig, ConfigError, CorsConfig, LimitsConfig, ServerConfig,
    ServiceInfoConfig, StorageConfig, DEFAULT_SECRET_KEY,
};
pub use context::RequestContext;
pub use envelope::{messages, Envelope, EnvelopeBuilder, FaultReport, MsgLevel, Reply};
pub use error::{codes, HandlerFault, ResponseCode, ServiceError};
pub use routes::{paths, BodyMode, RouteInfo, RouteRegistry, RouteTier, ROUTE_REGISTRY};
pub use token::{TokenCodec, Verification};
