use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use coursedesk_auth::{LoginAttemptGuard, TokenService};
use coursedesk_notifications::{Notifier, TemplateRenderer, build_notifier};
use coursedesk_storage::{KeyValueStore, RecordStore};

use crate::cache::CacheAside;
use crate::handlers::{self, assignments, auth, submissions};
use crate::{config::AppConfig, create_kv_store, create_record_store, middleware as app_middleware};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub records: Arc<dyn RecordStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub cache: CacheAside,
    pub guard: LoginAttemptGuard,
    pub tokens: Arc<TokenService>,
    pub notifier: Arc<dyn Notifier>,
    pub templates: Arc<TemplateRenderer>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        records: Arc<dyn RecordStore>,
        kv: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cache = CacheAside::new(kv.clone(), &config.cache);
        let guard = LoginAttemptGuard::new(kv.clone(), config.auth.rate_limiting.clone());
        let tokens = Arc::new(TokenService::new(
            &config.auth.jwt_secret,
            config.auth.token_lifetime,
        ));

        Self {
            config,
            records,
            kv,
            cache,
            guard,
            tokens,
            notifier,
            templates: Arc::new(TemplateRenderer::with_builtin()),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    // Bearer token required
    let protected = Router::new()
        .route(
            "/assignments",
            get(assignments::list).post(assignments::create),
        )
        .route(
            "/assignments/{id}",
            get(assignments::get_one)
                .put(assignments::update)
                .delete(assignments::delete),
        )
        .route("/assignments/{id}/submit", post(assignments::submit))
        .route("/assignments/{id}/submissions", get(assignments::report))
        .route("/submissions", get(submissions::list))
        .route("/submissions/{id}/grade", put(submissions::grade))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::authenticate,
        ));

    // Everything that touches the key-value store is refused while it is down
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .merge(protected)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::require_kv_connected,
        ));

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        .merge(api)
        // Layers run outermost-last: request id -> trace -> compression/cors -> metrics -> body limit
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(app_middleware::track_metrics))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    records: Option<Arc<dyn RecordStore>>,
    kv: Option<Arc<dyn KeyValueStore>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            records: None,
            kv: None,
            notifier: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Uses `records` instead of the backend named in the configuration.
    pub fn with_record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Uses `kv` instead of the backend named in the configuration.
    pub fn with_kv_store(mut self, kv: Arc<dyn KeyValueStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Connects the configured backends and assembles the router.
    pub async fn build(self) -> anyhow::Result<CoursedeskServer> {
        let records = match self.records {
            Some(records) => records,
            None => create_record_store(&self.config.storage).await?,
        };
        let kv = match self.kv {
            Some(kv) => kv,
            None => create_kv_store(&self.config.kv).await?,
        };
        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None => build_notifier(&self.config.mail)?,
        };

        tracing::info!(
            records = records.backend_name(),
            kv = kv.backend_name(),
            notifier = notifier.name(),
            "backends ready"
        );

        let state = AppState::new(Arc::new(self.config), records, kv, notifier);
        Ok(CoursedeskServer {
            addr: self.addr,
            app: build_app(state),
        })
    }
}

pub struct CoursedeskServer {
    addr: SocketAddr,
    app: Router,
}

impl CoursedeskServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until Ctrl+C.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!("listening on {}", listener.local_addr()?);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
