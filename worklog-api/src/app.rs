/// Application state and router builder
///
/// This module defines the shared application state, the backend wiring
/// for both backend kinds, and the function that builds the Axum router
/// with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use worklog_api::app::{build_router, AppState, Backend};
/// use worklog_api::config::Config;
/// use worklog_shared::events::ChangeHub;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::memory("a-secret-of-at-least-32-characters");
/// let changes = ChangeHub::default();
/// let backend = Backend::memory(&config, changes.clone())?;
/// let app = build_router(AppState::new(config, backend, changes, None));
///
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{actions::TaskActions, config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use worklog_shared::backend::{
    identity::HostedIdentity,
    memory::{MemoryIdentity, MemoryStorage, MemoryTaskStore},
    storage::HostedStorage,
    store::PgTaskStore,
    IdentityProvider, ObjectStorage, TaskStore,
};
use worklog_shared::events::ChangeHub;

/// The three backend collaborators
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub tasks: Arc<dyn TaskStore>,
}

impl Backend {
    /// Hosted auth and storage plus the backend database
    pub fn hosted(config: &Config, pool: PgPool) -> anyhow::Result<Self> {
        let url = config
            .backend
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("BACKEND_URL is not configured"))?;
        let anon_key = config
            .backend
            .anon_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("BACKEND_ANON_KEY is not configured"))?;

        Ok(Self {
            identity: Arc::new(HostedIdentity::new(url, anon_key.clone())?),
            storage: Arc::new(HostedStorage::new(url, anon_key)?),
            tasks: Arc::new(PgTaskStore::new(pool)),
        })
    }

    /// In-memory collaborators; the task store publishes into `changes`
    pub fn memory(config: &Config, changes: ChangeHub) -> anyhow::Result<Self> {
        let secret = config
            .backend
            .jwt_secret
            .clone()
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET is not configured"))?;

        Ok(Self {
            identity: Arc::new(MemoryIdentity::new(secret)),
            storage: Arc::new(MemoryStorage::new()),
            tasks: Arc::new(MemoryTaskStore::with_hub(changes)),
        })
    }
}

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Server actions over the backend
    pub actions: TaskActions,

    /// Identity provider, for the auth endpoints
    pub identity: Arc<dyn IdentityProvider>,

    /// Task change fan-out feeding the SSE endpoint
    pub changes: ChangeHub,

    /// Backend database pool (hosted backend only)
    pub db: Option<PgPool>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, backend: Backend, changes: ChangeHub, db: Option<PgPool>) -> Self {
        let actions = TaskActions::new(
            backend.identity.clone(),
            backend.storage,
            backend.tasks,
            config.backend.storage_bucket.clone(),
        );

        Self {
            actions,
            identity: backend.identity,
            changes,
            db,
            config: Arc::new(config),
        }
    }

    /// Whether cookies get the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.api.production
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health                       # Health check (public)
/// ├── GET  /                             # Redirect to /dashboard
/// ├── GET|POST /auth                     # Sign-in / sign-up page
/// ├── POST /auth/sign-out
/// ├── GET  /dashboard                    # Task grid (session required)
/// ├── POST /dashboard/tasks              # Create form target
/// ├── POST /dashboard/tasks/:id          # Edit form target
/// ├── POST /dashboard/tasks/:id/delete   # Delete form target
/// ├── GET  /assets/dashboard.js
/// └── /v1/                               # JSON API
///     ├── /auth/
///     │   ├── POST /sign-up
///     │   ├── POST /sign-in
///     │   ├── POST /sign-out
///     │   └── GET  /session
///     └── /tasks/
///         ├── GET    /                   # List (newest first)
///         ├── POST   /                   # Create (multipart)
///         ├── GET    /changes            # SSE change feed
///         ├── PUT    /:id
///         └── DELETE /:id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Body size limit (`MAX_UPLOAD_BYTES`)
/// 2. Logging (tower-http TraceLayer)
/// 3. CORS (tower-http CorsLayer)
/// 4. Security headers
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let page_routes = Router::new()
        .route("/", get(routes::pages::index))
        .route("/auth", get(routes::pages::auth_page).post(routes::pages::auth_submit))
        .route("/auth/sign-out", post(routes::pages::sign_out))
        .route("/dashboard", get(routes::pages::dashboard))
        .route("/dashboard/tasks", post(routes::pages::create_task))
        .route("/dashboard/tasks/:id", post(routes::pages::update_task))
        .route("/dashboard/tasks/:id/delete", post(routes::pages::delete_task))
        .route("/assets/dashboard.js", get(routes::pages::dashboard_script));

    let auth_routes = Router::new()
        .route("/sign-up", post(routes::auth::sign_up))
        .route("/sign-in", post(routes::auth::sign_in))
        .route("/sign-out", post(routes::auth::sign_out))
        .route("/session", get(routes::auth::session));

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list_tasks).post(routes::tasks::create_task))
        .route("/changes", get(routes::changes::task_changes))
        .route(
            "/:id",
            put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        );

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/tasks", task_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .merge(page_routes)
        .nest("/v1", v1_routes)
        .layer(DefaultBodyLimit::max(state.config.api.max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::with_image_origin(
            state.config.api.production,
            state.config.backend.url.as_deref(),
        ))
        .with_state(state)
}
