//! Application startup and lifecycle management.
//!
//! Wires the completion provider, rate limiter and CORS policy into one axum
//! router and serves it until a shutdown signal arrives.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use service_core::error::AppError;
use service_core::middleware::{
    cors::{cors_middleware, CorsPolicy, SharedCorsPolicy},
    metrics::metrics_middleware,
    rate_limit::{rate_limit_middleware, FixedWindowRateLimiter, SharedRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::ChatProxyConfig;
use crate::handlers;
use crate::services::providers::azure_openai::AzureOpenAiProvider;
use crate::services::providers::CompletionProvider;
use crate::services::{ChatService, RequestValidator};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub chat: ChatService,
    pub rate_limiter: SharedRateLimiter,
    pub cors: SharedCorsPolicy,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from configuration around an existing provider.
    pub fn from_config(
        config: &ChatProxyConfig,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, AppError> {
        let limits = &config.limits;

        let cors = CorsPolicy::new(config.cors.allowed_origins.iter().cloned())
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        let rate_limiter = FixedWindowRateLimiter::new(
            limits.rate_limit_max_requests,
            Duration::from_millis(limits.rate_limit_window_ms),
        );

        let chat = ChatService::new(
            RequestValidator::new(limits.max_messages, limits.max_message_length),
            provider,
            config.system_prompt.as_str(),
            limits.max_tokens,
        );

        Ok(Self {
            service_name: config.service_name.as_str().into(),
            chat,
            rate_limiter: Arc::new(rate_limiter),
            cors: Arc::new(cors),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let chat_routes = Router::new()
        .route(
            "/api/chat",
            post(handlers::chat::chat).fallback(handlers::fallback::method_not_allowed),
        )
        .route_layer(from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route(
            "/health",
            get(handlers::health::health_check).fallback(handlers::fallback::method_not_allowed),
        )
        .route(
            "/metrics",
            get(handlers::metrics::metrics).fallback(handlers::fallback::method_not_allowed),
        )
        .merge(chat_routes)
        .fallback(handlers::fallback::not_found)
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        // Preflight is answered here, before rate limiting and routing
        .layer(from_fn_with_state(state.cors.clone(), cors_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    correlation_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application against the configured Azure OpenAI deployment.
    pub async fn build(
        config: ChatProxyConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, AppError> {
        let provider = AzureOpenAiProvider::new(config.azure_openai.clone())
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        if !provider.is_configured() {
            tracing::warn!("Azure OpenAI is not configured; chat requests will fail");
        } else {
            tracing::info!(
                deployment = %config.azure_openai.deployment,
                api_version = %config.azure_openai.api_version,
                "Initialized Azure OpenAI provider"
            );
        }

        Self::build_with_provider(config, Arc::new(provider), metrics).await
    }

    /// Build the application around any provider (port 0 = random port for testing).
    pub async fn build_with_provider(
        config: ChatProxyConfig,
        provider: Arc<dyn CompletionProvider>,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, AppError> {
        let mut state = AppState::from_config(&config, provider)?;
        if let Some(handle) = metrics {
            state = state.with_metrics(handle);
        }

        tracing::info!(
            window_ms = config.limits.rate_limit_window_ms,
            max_requests = config.limits.rate_limit_max_requests,
            max_messages = config.limits.max_messages,
            max_message_length = config.limits.max_message_length,
            origins = ?config.cors.allowed_origins,
            "Request limits configured"
        );

        let address = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("{} listening on port {}", config.service_name, port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(
            self.listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            e
        })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
