// src/routes.rs

use std::sync::Arc;

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, home, quiz, store},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, home, quiz, store, admin).
/// * Applies global middleware (Trace, CORS) and rate limits the public
///   auth endpoints.
/// * Injects global state (pool, config, mailer).
///
/// The governor layer keys on the peer address, so the server must be
/// started with `into_make_service_with_connect_info::<SocketAddr>()`.
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

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(100)
            .finish()
            .unwrap(),
    );

    // Public endpoints, rate limited against credential stuffing and
    // verification code spam.
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/verify", post(auth::verify))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let home_routes = Router::new()
        .route("/home", get(home::home_data))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let quiz_routes = Router::new()
        .route("/{id}", get(quiz::get_quiz))
        .route("/{id}/answer", post(quiz::submit_answer))
        .route("/{id}/finish", post(quiz::finish_quiz))
        .route("/{id}/reset", put(quiz::reset_quiz))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let store_routes = Router::new()
        .route("/packages", get(store::list_packages))
        .route("/buy/{package}", post(store::buy_stars))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route(
            "/subjects",
            get(admin::list_subjects).post(admin::create_subject),
        )
        .route(
            "/subjects/{id}",
            put(admin::update_subject).delete(admin::delete_subject),
        )
        .route("/subjects/{id}/quizzes", get(admin::list_quizzes))
        .route("/quizzes", post(admin::create_quiz))
        .route(
            "/quizzes/{id}",
            put(admin::update_quiz).delete(admin::delete_quiz),
        )
        .route("/quizzes/{id}/questions", get(admin::list_questions))
        .route("/questions", post(admin::create_question))
        .route(
            "/questions/{id}",
            get(admin::get_question)
                .put(admin::update_question)
                .delete(admin::delete_question),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        // Promotion needs a valid token plus the admin key, not the admin
        // role, so the first admin can be bootstrapped.
        .merge(
            Router::new()
                .route("/promote", post(admin::promote))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", home_routes)
        .nest("/api/quiz", quiz_routes)
        .nest("/api/store", store_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
