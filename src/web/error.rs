use crate::api::ApiError;
use crate::services::session_store::StoreError;
use crate::web::{
    session::{SessionError, SessionRevoked},
    views,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    /// The backend refused the visitor's credential.
    #[error("session expired")]
    SessionExpired,
    #[error("session store: {0}")]
    Store(#[from] StoreError),
    #[error("session token: {0}")]
    Token(#[from] SessionError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("backend unavailable: {0}")]
    Backend(String),
}

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        match &err {
            ApiError::Unauthorized => PageError::SessionExpired,
            ApiError::Status { status, .. } if *status == reqwest::StatusCode::NOT_FOUND => {
                PageError::NotFound(err.user_message("Not found"))
            }
            _ => PageError::Backend(err.user_message("The server could not be reached.")),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::SessionExpired => {
                let mut response = Redirect::to("/login").into_response();
                response.extensions_mut().insert(SessionRevoked);
                response
            }
            PageError::Store(e) => {
                tracing::error!("Session store failure: {}", e);
                views::message_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    None,
                    "Your session could not be saved. Please try again.",
                    Some(("/login", "Back to login")),
                )
            }
            PageError::Token(e) => {
                tracing::error!("Failed to sign session: {}", e);
                views::message_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    None,
                    "Your session could not be started. Please try again.",
                    Some(("/login", "Back to login")),
                )
            }
            PageError::NotFound(message) => views::message_page(
                StatusCode::NOT_FOUND,
                "Not found",
                None,
                &message,
                Some(("/", "Home")),
            ),
            PageError::BadRequest(message) => views::message_page(
                StatusCode::BAD_REQUEST,
                "Invalid request",
                None,
                &message,
                Some(("/", "Home")),
            ),
            PageError::Backend(message) => {
                tracing::warn!("Backend failure shown to visitor: {}", message);
                views::message_page(
                    StatusCode::BAD_GATEWAY,
                    "Service unavailable",
                    None,
                    &message,
                    Some(("/", "Home")),
                )
            }
        }
    }
}

/// Lets a page show a failed backend call inline while still handing a
/// refused credential to the session controller.
pub trait InlineResult<T> {
    fn inline(self) -> Result<Result<T, ApiError>, PageError>;
}

impl<T> InlineResult<T> for Result<T, ApiError> {
    fn inline(self) -> Result<Result<T, ApiError>, PageError> {
        match self {
            Err(ApiError::Unauthorized) => Err(PageError::SessionExpired),
            other => Ok(other),
        }
    }
}
