// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{answers, assignments, questions, submissions, users},
    state::AppState,
    utils::jwt::auth_middleware,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Registration and login are public, everything else requires a bearer token.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool and config).
pub fn create_router(state: AppState) -> Router {
    let auth = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .merge(
            Router::new()
                .route("/", get(users::list_users))
                .route("/profile", get(users::profile))
                .route("/{id}", delete(users::delete_user))
                .route_layer(auth()),
        );

    let assignment_routes = Router::new()
        .route(
            "/",
            get(assignments::list_assignments).post(assignments::create_assignment),
        )
        .route(
            "/{id}",
            get(assignments::get_assignment)
                .patch(assignments::update_assignment)
                .delete(assignments::delete_assignment),
        )
        .route_layer(auth());

    let question_routes = Router::new()
        .route("/", post(questions::create_question))
        .route(
            "/assignment/{assignment_id}",
            get(questions::list_questions),
        )
        .route(
            "/{id}",
            get(questions::get_question)
                .patch(questions::update_question)
                .delete(questions::delete_question),
        )
        .route_layer(auth());

    let submission_routes = Router::new()
        .route("/", post(submissions::create_submission))
        .route("/grade", patch(submissions::grade_submissions))
        .route(
            "/submission/{assignment_id}",
            get(submissions::list_submissions),
        )
        .route(
            "/{id}",
            get(submissions::get_submission).delete(submissions::delete_submission),
        )
        .route_layer(auth());

    let answer_routes = Router::new()
        .route("/{id}", get(answers::get_answer).post(answers::grade_answer))
        .route("/{id}/grades", get(answers::grade_history))
        .route("/submissions/{submission_id}", get(answers::list_answers))
        .route_layer(auth());

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/assignments", assignment_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/submissions", submission_routes)
        .nest("/api/answers", answer_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
