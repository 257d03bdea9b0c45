//! # Murmur HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `POST /api/auth/register` - Register a new user
//! - `POST /api/auth/login` - Log in, receive a bearer token
//! - `GET  /api/users/me` - Own profile (auth)
//! - `PUT  /api/users/me/update` - Partial profile update, optional avatar upload (auth)
//! - `POST /api/users/{id}/follow` / `/unfollow` - Follow graph (auth)
//! - `GET  /api/users/{id}/replies|media|likes` - Per-user aggregations
//! - `GET  /api/users/id/{id}/following_list` (and `username/{username}`, and `followers_list`)
//! - `GET  /api/users/{id}` / `/api/users/username/{username}` - Public profiles
//! - `POST /api/posts` - Create post, optional image uploads (auth)
//! - `GET  /api/posts?sort=time|likes` - List posts
//! - `GET  /api/posts/{id}` - Single post
//! - `GET  /api/posts/user/{user_id}` - Posts by user
//! - `POST /api/posts/{id}/comments` - Add comment (auth)
//! - `DELETE /api/posts/{id}/comments/{comment_id}` - Delete comment (auth)
//! - `PUT  /api/posts/{id}/like` and `.../comments/{comment_id}/like` - Like toggles (auth)
//! - `GET  /health` - Health check
//! - `GET  /uploads/...` - Stored avatar and post image files
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `MURMUR_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `MURMUR_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `MURMUR_JWT_SECRET`: Token signing secret (development fallback if unset)
//! - `MURMUR_UPLOAD_DIR`: Upload root directory (default: uploads)

mod auth;
mod handlers;
mod middleware;
mod types;
mod uploads;

// Re-exports for external use
pub use auth::{CurrentUser, TokenSigner, get_jwt_secret_from_env};
pub use middleware::RateLimit;
pub use uploads::UploadStore;
// Re-export response types for integration tests (via `murmur::api::*`)
#[allow(unused_imports)]
pub use types::{
    AuthResponse, CommentRequest, CreatePostRequest, HealthResponse, LikesResponse, LoginRequest,
    MessageResponse, ProfileResponse, RegisterRequest, UpdateProfileRequest,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use murmur_core::{Session, SocialError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Upper bound for request bodies. A post may carry five 5 MiB images plus
/// multipart framing; individual files are checked against the 5 MiB limit
/// separately.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the session behind a read-write lock, the token
/// signer, and the upload store.
#[derive(Clone)]
pub struct AppState {
    /// The session containing the social stores.
    pub session: Arc<RwLock<Session>>,
    /// Issues and verifies bearer tokens.
    pub tokens: Arc<TokenSigner>,
    /// Writes and deletes uploaded files.
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(session: Session, tokens: TokenSigner, uploads: UploadStore) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            tokens: Arc::new(tokens),
            uploads: Arc::new(uploads),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Origins admitted when `MURMUR_CORS_ORIGINS` is unset: the usual local
/// dev servers.
const LOCAL_DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
];

/// Build the CORS layer from `MURMUR_CORS_ORIGINS`.
///
/// The variable is a comma-separated origin list, or `*` to admit any
/// origin. Unparseable entries are skipped with a warning; an empty or
/// unset list falls back to [`LOCAL_DEV_ORIGINS`].
fn cors_from_env() -> CorsLayer {
    let configured = std::env::var("MURMUR_CORS_ORIGINS").ok();
    if configured.as_deref() == Some("*") {
        tracing::warn!("CORS: admitting every origin; set MURMUR_CORS_ORIGINS for production");
        return CorsLayer::permissive();
    }

    let mut origins: Vec<HeaderValue> = Vec::new();
    for origin in configured.as_deref().unwrap_or_default().split(',') {
        let origin = origin.trim();
        if origin.is_empty() {
            continue;
        }
        match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::info!(origin, "CORS: admitting origin");
                origins.push(value);
            }
            Err(e) => tracing::warn!(origin, error = %e, "CORS: skipping unparseable origin"),
        }
    }

    if origins.is_empty() {
        if configured.is_some() {
            tracing::warn!("CORS: nothing usable in MURMUR_CORS_ORIGINS, admitting localhost only");
        }
        origins = LOCAL_DEV_ORIGINS
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. CORS - handles preflight requests
/// 2. Tracing - logs all requests
/// 3. Body limit - bounds multipart uploads
/// 4. Rate limiting - protects against DoS (if enabled)
///
/// Authentication is per-handler: protected handlers declare the
/// `CurrentUser` extractor, which verifies the bearer token and re-resolves
/// the subject against the identity store.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_from_env();
    let throttle = RateLimit::from_env();
    match &throttle {
        Some(limit) => tracing::info!(rate = limit.rate(), "Rate limiting enabled"),
        None => tracing::info!("Rate limiting disabled"),
    }

    // Build base router with routes
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/auth/register", post(handlers::register_handler))
        .route("/api/auth/login", post(handlers::login_handler))
        .route("/api/users/me", get(handlers::me_handler))
        .route(
            "/api/users/me/update",
            put(handlers::update_profile_handler),
        )
        .route("/api/users/{id}/follow", post(handlers::follow_handler))
        .route("/api/users/{id}/unfollow", post(handlers::unfollow_handler))
        .route(
            "/api/users/{id}/replies",
            get(handlers::user_replies_handler),
        )
        .route("/api/users/{id}/media", get(handlers::user_media_handler))
        .route(
            "/api/users/{id}/likes",
            get(handlers::user_liked_posts_handler),
        )
        .route(
            "/api/users/id/{id}/following_list",
            get(handlers::following_by_id_handler),
        )
        .route(
            "/api/users/username/{username}/following_list",
            get(handlers::following_by_username_handler),
        )
        .route(
            "/api/users/id/{id}/followers_list",
            get(handlers::followers_by_id_handler),
        )
        .route(
            "/api/users/username/{username}/followers_list",
            get(handlers::followers_by_username_handler),
        )
        .route(
            "/api/users/username/{username}",
            get(handlers::profile_by_username_handler),
        )
        .route("/api/users/{id}", get(handlers::profile_by_id_handler))
        .route(
            "/api/posts",
            post(handlers::create_post_handler).get(handlers::list_posts_handler),
        )
        .route("/api/posts/{id}", get(handlers::get_post_handler))
        .route(
            "/api/posts/user/{user_id}",
            get(handlers::posts_by_user_handler),
        )
        .route(
            "/api/posts/{id}/comments",
            post(handlers::add_comment_handler),
        )
        .route(
            "/api/posts/{id}/comments/{comment_id}",
            delete(handlers::delete_comment_handler),
        )
        .route("/api/posts/{id}/like", put(handlers::like_post_handler))
        .route(
            "/api/posts/{id}/comments/{comment_id}/like",
            put(handlers::like_comment_handler),
        )
        .nest_service(
            "/uploads",
            ServeDir::new(state.uploads.root().to_path_buf()),
        );

    // Apply rate limiting middleware
    if let Some(limit) = throttle {
        router = router.layer(axum_middleware::from_fn_with_state(
            limit,
            middleware::throttle,
        ));
    }

    // Apply CORS, body limit, and tracing (outermost layers)
    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, session: Session) -> Result<(), SocialError> {
    let tokens = TokenSigner::from_env();
    let uploads = UploadStore::from_env();
    uploads.ensure_dirs().await?;

    let state = AppState::new(session, tokens, uploads);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SocialError::Io(format!("Bind failed: {e}")))?;

    tracing::info!("Murmur HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| SocialError::Io(format!("Server error: {e}")))
}
