//! Route registry: every known `(method, path)` with its access tier.
//!
//! Public: reachable without a session (the allow-list)
//! Session: requires a valid `token` cookie

use axum::http::Method;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Route paths
pub mod paths {
    pub const STATUS: &str = "/api/status";
    pub const LOGIN: &str = "/api/login";
    pub const GET_INFO: &str = "/api/get_info";
    pub const SAVE: &str = "/api/save";
    pub const DOWNLOAD: &str = "/api/download";
    pub const UPLOAD: &str = "/api/upload";
}

/// Route access tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteTier {
    /// No session required
    Public,
    /// Valid session token required
    Session,
}

impl RouteTier {
    pub fn requires_auth(&self) -> bool {
        matches!(self, RouteTier::Session)
    }
}

/// How the pipeline treats the request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyMode {
    /// Buffered and parsed as JSON when the content type says so
    Json,
    /// Left untouched for the handler (multipart upload)
    Binary,
}

/// Route metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteInfo {
    /// HTTP method name
    pub method: &'static str,
    /// Request path
    pub path: &'static str,
    /// Access tier
    pub tier: RouteTier,
    /// Body handling
    pub body: BodyMode,
}

impl RouteInfo {
    pub const fn public(method: &'static str, path: &'static str) -> Self {
        Self {
            method,
            path,
            tier: RouteTier::Public,
            body: BodyMode::Json,
        }
    }

    pub const fn session(method: &'static str, path: &'static str) -> Self {
        Self {
            method,
            path,
            tier: RouteTier::Session,
            body: BodyMode::Json,
        }
    }

    pub const fn binary(mut self) -> Self {
        self.body = BodyMode::Binary;
        self
    }
}

/// Lookup table of known routes, keyed by path then method
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    routes: HashMap<&'static str, HashMap<&'static str, RouteInfo>>,
}

impl RouteRegistry {
    pub fn new(routes: impl IntoIterator<Item = RouteInfo>) -> Self {
        let mut table: HashMap<&'static str, HashMap<&'static str, RouteInfo>> = HashMap::new();
        for route in routes {
            table.entry(route.path).or_default().insert(route.method, route);
        }
        Self { routes: table }
    }

    /// The routes served by the admin API
    pub fn standard() -> Self {
        Self::new([
            RouteInfo::public("GET", paths::STATUS),
            RouteInfo::public("POST", paths::LOGIN),
            RouteInfo::session("POST", paths::GET_INFO),
            RouteInfo::session("POST", paths::SAVE),
            RouteInfo::session("POST", paths::DOWNLOAD),
            RouteInfo::session("POST", paths::UPLOAD).binary(),
        ])
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Option<&RouteInfo> {
        self.routes.get(path)?.get(method.as_str())
    }

    /// Paths reachable without a session
    pub fn allow_list(&self) -> Vec<&'static str> {
        let mut paths: Vec<_> = self
            .routes
            .values()
            .flat_map(|methods| methods.values())
            .filter(|r| !r.tier.requires_auth())
            .map(|r| r.path)
            .collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

/// Registry used by the service
pub static ROUTE_REGISTRY: LazyLock<RouteRegistry> = LazyLock::new(RouteRegistry::standard);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        assert_eq!(ROUTE_REGISTRY.allow_list(), vec![paths::LOGIN, paths::STATUS]);
    }

    #[test]
    fn test_lookup_is_method_sensitive() {
        assert!(ROUTE_REGISTRY.lookup(&Method::GET, paths::STATUS).is_some());
        assert!(ROUTE_REGISTRY.lookup(&Method::POST, paths::STATUS).is_none());
        assert!(ROUTE_REGISTRY.lookup(&Method::GET, paths::LOGIN).is_none());
        assert!(ROUTE_REGISTRY.lookup(&Method::POST, "/api/nope").is_none());
    }

    #[test]
    fn test_lookup_with_borrowed_path() {
        let registry = RouteRegistry::standard();
        let requested = String::from("/api/save");

        let route = registry.lookup(&Method::POST, &requested).unwrap();
        assert_eq!(route.path, paths::SAVE);
        assert!(registry.lookup(&Method::PATCH, &requested).is_none());
    }

    #[test]
    fn test_upload_is_binary() {
        let upload = ROUTE_REGISTRY.lookup(&Method::POST, paths::UPLOAD).unwrap();
        assert_eq!(upload.body, BodyMode::Binary);
        assert!(upload.tier.requires_auth());

        let save = ROUTE_REGISTRY.lookup(&Method::POST, paths::SAVE).unwrap();
        assert_eq!(save.body, BodyMode::Json);
    }
}
