/// Application state and router builder
///
/// Defines the shared application state (database pool, configuration, the
/// code-delivery collaborator) and assembles the Axum router with all
/// routes and middleware.
///
/// # Example
///
/// ```no_run
/// use kazoku_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use kazoku_shared::auth::middleware as auth_guard;
use kazoku_shared::notify::{LogNotifier, Notifier};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned per request via Axum's `State` extractor; owned process-wide with
/// an explicit lifecycle (pool opened at startup, closed on shutdown).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Verification-code delivery collaborator (stubbed by default)
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Creates application state with the logging notifier stub
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Creates application state with a custom notifier
    pub fn with_notifier(db: PgPool, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            notifier,
        }
    }

    /// Gets the JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /send-code        # public
///     │   ├── POST /verify-code      # public
///     │   ├── POST /register         # public
///     │   ├── POST /login            # public
///     │   ├── POST /refresh          # public (bears refresh token)
///     │   └── POST /logout           # bearer
///     ├── /users/                    # bearer
///     │   ├── GET/PATCH /me
///     │   ├── POST /me/role
///     │   ├── POST /me/device-token
///     │   └── POST /me/avatar
///     └── /families/                 # bearer
///         ├── POST/GET /
///         ├── POST /join
///         ├── GET /:family_id
///         ├── GET /:family_id/members
///         ├── GET/POST /:family_id/invite-code
///         └── POST /:family_id/leave
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Public auth flows
    let auth_public = Router::new()
        .route("/send-code", post(routes::auth::send_code))
        .route("/verify-code", post(routes::auth::verify_code))
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    // Logout revokes sessions, so it must know who is calling
    let auth_protected = Router::new()
        .route("/logout", post(routes::auth::logout))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::users::me).patch(routes::users::update_me),
        )
        .route("/me/role", post(routes::users::set_role))
        .route("/me/device-token", post(routes::users::register_device_token))
        .route("/me/avatar", post(routes::users::upload_avatar))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let family_routes = Router::new()
        .route(
            "/",
            post(routes::families::create_family).get(routes::families::list_families),
        )
        .route("/join", post(routes::families::join_family))
        .route("/:family_id", get(routes::families::get_family))
        .route("/:family_id/members", get(routes::families::list_members))
        .route(
            "/:family_id/invite-code",
            get(routes::families::get_invite_code)
                .post(routes::families::regenerate_invite_code),
        )
        .route("/:family_id/leave", post(routes::families::leave_family))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_public.merge(auth_protected))
        .nest("/users", user_routes)
        .nest("/families", family_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Bearer authentication middleware layer
///
/// Delegates to the shared guard, mapping its failures into the API error
/// taxonomy (`UNAUTHORIZED`, `TOKEN_EXPIRED`, `INVALID_TOKEN`).
async fn bearer_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    auth_guard::authenticate(&state.db, state.jwt_secret(), req, next)
        .await
        .map_err(Into::into)
}
