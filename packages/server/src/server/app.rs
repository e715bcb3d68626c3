//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domains::auth::JwtService;
use crate::domains::shifts::ShiftLifecycle;
use crate::kernel::{
    HttpPushSender, NotificationDispatcher, PgMemberDirectory, PgShiftStore, PgSubscriptionStore,
};
use crate::server::middleware::session_auth_middleware;
use crate::server::routes::{auth, export, health, history, members, org, push, roles, shifts};
use crate::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub lifecycle: Arc<ShiftLifecycle>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub jwt: Arc<JwtService>,
}

/// Build the application with production collaborators wired in
pub fn build_app(pool: PgPool, config: &Config) -> Router {
    let jwt = Arc::new(JwtService::new(
        &config.jwt_secret,
        config.jwt_issuer.clone(),
    ));
    let store = Arc::new(PgShiftStore::new(pool.clone()));
    let lifecycle = Arc::new(ShiftLifecycle::new(store));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(PgMemberDirectory::new(pool.clone())),
        Arc::new(PgSubscriptionStore::new(pool.clone())),
        Arc::new(HttpPushSender::new()),
    ));

    let state = AppState {
        db_pool: pool,
        lifecycle,
        dispatcher,
        jwt,
    };
    build_router(state)
}

/// Build the Axum router for a given state. Tests call this directly with
/// in-memory collaborators.
pub fn build_router(state: AppState) -> Router {
    // CORS - the web client is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let jwt_for_middleware = state.jwt.clone();

    Router::new()
        .route("/api/auth", post(auth::auth_handler))
        .route("/api/auth/session", get(auth::get_session))
        .route(
            "/api/org",
            get(org::get_org).post(org::regenerate_join_code),
        )
        .route(
            "/api/members",
            get(members::list_members).delete(members::delete_member),
        )
        .route(
            "/api/roles",
            get(roles::list_roles)
                .post(roles::create_role)
                .delete(roles::delete_role)
                .patch(roles::update_assignments),
        )
        .route("/api/roles/public", get(roles::public_roles))
        .route(
            "/api/shifts",
            get(shifts::list_shifts)
                .post(shifts::create_shift)
                .patch(shifts::transition_shift),
        )
        .route("/api/history", get(history::get_history))
        .route("/api/export", get(export::export_shifts))
        .route(
            "/api/push",
            post(push::subscribe).delete(push::unsubscribe),
        )
        .route("/health", get(health::health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            session_auth_middleware(jwt_for_middleware.clone(), req, next)
        }))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
