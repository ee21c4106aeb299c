// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, dashboard, quiz, topics},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, reference data, quiz, dashboard).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, feedback generator, session registry).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let path_routes = Router::new().route("/", get(topics::list_paths));

    let topic_routes = Router::new()
        .route("/", get(topics::list_topics))
        .route("/{id}", get(topics::get_topic));

    let quiz_routes = Router::new()
        .route("/start", post(quiz::start_quiz))
        .route("/{id}", get(quiz::session_snapshot))
        .route("/{id}/answer", post(quiz::select_option))
        .route("/{id}/next", post(quiz::advance))
        .route("/{id}/prev", post(quiz::retreat))
        .route("/{id}/submit", post(quiz::submit_quiz))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let dashboard_routes = Router::new()
        .route("/me", get(dashboard::student_dashboard))
        // Double middleware protection: Auth first, then teacher-role check
        .merge(
            Router::new()
                .route("/class", get(dashboard::class_analytics))
                .layer(middleware::from_fn(teacher_middleware)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/paths", path_routes)
        .nest("/api/topics", topic_routes)
        .nest("/api/quiz", quiz_routes)
        .nest("/api/dashboard", dashboard_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
