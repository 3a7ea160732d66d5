//! Admin API service: wires configuration, storage and the pipeline into an
//! axum router and serves it.

use crate::adapters::request_id::{FileRequestCounter, RequestIdSource};
use crate::adapters::storage::{ImageStore, InfoStore};
use crate::domain::config::AdminConfig;
use crate::domain::error::ServiceError;
use crate::domain::routes::{paths, ROUTE_REGISTRY};
use crate::domain::token::TokenCodec;
use crate::handlers::{self, files, info, login, status, AppState};
use crate::middleware::{create_cors_layer, PipelineLayer};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{info, warn};

/// Admin API service state
pub struct AdminApiService {
    config: AdminConfig,
    counter: Arc<FileRequestCounter>,
    tokens: Arc<TokenCodec>,
    state: AppState,
}

impl AdminApiService {
    /// Validate the configuration and open the durable request id record.
    ///
    /// The record stays locked until the service and every router built
    /// from it are dropped.
    pub fn new(config: AdminConfig) -> Result<Self, ServiceError> {
        config.validate()?;

        if config.uses_default_secret() {
            warn!("Using the built-in development secret_key; set SITE_SECRET_KEY in production");
        }

        let counter = Arc::new(FileRequestCounter::open(
            &config.storage.request_id_path(),
        )?);

        let tokens = Arc::new(TokenCodec::new(
            config.auth.secret_key.as_bytes(),
            config.auth.token_max_age,
        )?);

        let state = AppState {
            info: Arc::new(InfoStore::new(config.storage.info_path())),
            images: Arc::new(ImageStore::new(config.storage.data_dir.clone())),
            tokens: Arc::clone(&tokens),
            accounts: Arc::new(config.auth.accounts.clone()),
            service: Arc::new(config.service.clone()),
        };

        info!(
            data_dir = %config.storage.data_dir.display(),
            request_id_record = %counter.path().display(),
            accounts = config.auth.accounts.len(),
            "Admin API service created"
        );

        Ok(Self {
            config,
            counter,
            tokens,
            state,
        })
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn counter(&self) -> Arc<FileRequestCounter> {
        Arc::clone(&self.counter)
    }

    /// Build the router with the full middleware stack
    pub fn router(&self) -> Router {
        let counter: Arc<dyn RequestIdSource> = self.counter.clone();

        let middleware = ServiceBuilder::new()
            .layer(create_cors_layer(&self.config.cors))
            .layer(PipelineLayer::new(
                counter,
                Arc::clone(&self.tokens),
                &ROUTE_REGISTRY,
                self.config.limits.max_json_body,
            ))
            .layer(DefaultBodyLimit::max(self.config.limits.max_upload_size));

        Router::new()
            .route(paths::STATUS, get(status::status))
            .route(paths::LOGIN, post(login::login))
            .route(paths::GET_INFO, post(info::get_info))
            .route(paths::SAVE, post(info::save))
            .route(paths::DOWNLOAD, post(files::download))
            .route(paths::UPLOAD, post(files::upload))
            .fallback(handlers::fallback)
            .layer(middleware)
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), ServiceError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::Bind(format!("{}: {}", addr, e)))?;
        info!(addr = %addr, "Starting HTTP server");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServiceError::Serve(e.to_string()))?;

        info!("Admin API stopped");
        Ok(())
    }
}
