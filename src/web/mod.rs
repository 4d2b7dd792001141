pub mod admin_questions;
pub mod admin_responses;
pub mod auth;
pub mod error;
pub mod home;
pub mod questionnaire;
pub mod session;
pub mod views;

use crate::state::SharedState;
use axum::{
    http::{header, HeaderValue},
    middleware, Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .merge(home::router(state.clone()))
        .merge(auth::router(state.clone()))
        .merge(questionnaire::router(state.clone()))
        .merge(admin_questions::router(state.clone()))
        .merge(admin_responses::router(state))
        .fallback(home::fallback)
}

/// Every page behind the session controller, plus request tracing.
pub fn app(state: SharedState) -> Router {
    routes(state.clone())
        .layer(middleware::from_fn_with_state(
            state,
            session::session_controller,
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http())
}
