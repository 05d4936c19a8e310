//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: verification API plus catch-all page forwarding
//! - Wire up middleware (gate, rate limit, tracing, limits, request ID)
//! - Forward allowed page requests to the upstream page server
//! - Apply hot-reloaded route policy
//! - Sweep expired rate limit windows

use axum::{
    body::Body,
    extract::State,
    http::{uri::{Authority, PathAndQuery, Scheme}, Request, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, post},
    Router,
};
use arc_swap::ArcSwap;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{AuthError, SessionProvider, SupabaseSessionProvider};
use crate::config::GateConfig;
use crate::gate::{gate_middleware, rate_limit_middleware, GatePolicy, GateState};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::strip_hop_by_hop;
use crate::observability::metrics;
use crate::security::headers::set_real_ip;
use crate::security::rate_limit::{self, RateLimiter};
use crate::security::{resolve_client_ip, ClientIdentity};
use crate::verification::{
    complete_verification, start_verification, MemoryVerificationStore, StoreError,
    UserStatusStore, VerificationState, VerificationStore,
};

/// Error raised while assembling the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid upstream address '{0}'")]
    InvalidUpstream(String),

    #[error("identity provider: {0}")]
    Identity(#[from] AuthError),

    #[error("verification store: {0}")]
    Store(#[from] StoreError),
}

/// Collaborators injected into the server.
#[derive(Clone)]
pub struct GateServices {
    pub sessions: Arc<dyn SessionProvider>,
    pub verification_store: Arc<dyn VerificationStore>,
    pub user_store: Arc<dyn UserStatusStore>,
    pub limiter: Arc<dyn RateLimiter>,
}

/// State for the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

/// The gate's HTTP server.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    policy: Arc<ArcSwap<GatePolicy>>,
    limiter: Arc<dyn RateLimiter>,
}

impl HttpServer {
    /// Create a server backed by the configured identity provider and an
    /// in-memory verification store.
    pub fn new(config: GateConfig) -> Result<Self, ServerError> {
        let store = match &config.verification.store_path {
            Some(path) => MemoryVerificationStore::load_from_file(path)?,
            None => MemoryVerificationStore::new(None),
        };
        let store = Arc::new(store);
        let services = GateServices {
            sessions: Arc::new(SupabaseSessionProvider::new(&config.identity)?),
            verification_store: store.clone(),
            user_store: store,
            limiter: rate_limit::from_config(&config.rate_limit),
        };
        Self::with_services(config, services)
    }

    /// Create a server with injected collaborators.
    pub fn with_services(config: GateConfig, services: GateServices) -> Result<Self, ServerError> {
        let upstream = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::InvalidUpstream(config.upstream.address.clone()))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.upstream_connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let policy = Arc::new(ArcSwap::from_pointee(GatePolicy::from_config(&config)));

        let gate = GateState {
            policy: policy.clone(),
            limiter: services.limiter.clone(),
            sessions: services.sessions,
            cookie_name: config.identity.cookie_name.clone(),
        };
        let verification = VerificationState::new(
            &config.verification,
            services.verification_store,
            services.user_store,
        );
        let state = AppState { client, upstream };

        let router = Self::build_router(&config, state, gate, verification);
        Ok(Self {
            router,
            config,
            policy,
            limiter: services.limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GateConfig,
        state: AppState,
        gate: GateState,
        verification: VerificationState,
    ) -> Router {
        let api = Router::new()
            .route("/api/verification/start", post(start_verification))
            .route("/api/verification/complete", post(complete_verification))
            .with_state(verification)
            .layer(middleware::from_fn_with_state(gate.clone(), rate_limit_middleware));

        let pages = Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(gate, gate_middleware));

        api.merge(pages)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` replace the live route policy;
    /// other settings need a restart.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let policy = self.policy.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                policy.store(Arc::new(GatePolicy::from_config(&config)));
                tracing::info!(
                    public_routes = config.routes.public.len(),
                    excluded_routes = config.routes.excluded.len(),
                    "Route policy reloaded"
                );
            }
        });

        if self.config.rate_limit.enabled {
            tokio::spawn(rate_limit::run_cleanup(
                self.limiter.clone(),
                Duration::from_secs(self.config.rate_limit.cleanup_interval_secs),
                shutdown.resubscribe(),
            ));
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Live policy handle, shared with the admin API.
    pub fn policy(&self) -> Arc<ArcSwap<GatePolicy>> {
        self.policy.clone()
    }
}

/// Forward an admitted request to the upstream page server.
async fn forward_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request).to_string();
    let client_ip = request
        .extensions()
        .get::<ClientIdentity>()
        .map(|c| c.ip.clone())
        .unwrap_or_else(|| resolve_client_ip(request.headers()));

    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Cannot rewrite request URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };
    strip_hop_by_hop(&mut parts.headers);
    set_real_ip(&mut parts.headers, &client_ip);

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_upstream(response.status().as_u16(), start_time);
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_upstream(502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
