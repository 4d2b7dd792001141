//! HTTP client for the questionnaire backend.
//!
//! Every call takes the caller's bearer credential (if any). A 401 comes back
//! as [`ApiError::Unauthorized`]; clearing the session is left to the page
//! layer, which hands the signal to the session controller.

pub mod auth;
pub mod questions;
pub mod responses;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,
    #[error("backend returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected backend response: {0}")]
    InvalidResponse(String),
    #[error("invalid backend url: {0}")]
    BaseUrl(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Backend-provided message when there is one, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::BaseUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::BaseUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Transport)?;
        Ok(Self { http, base })
    }

    /// `<base>/api/<segments...>`, each segment percent-encoded.
    fn url<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::BaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn request<S: AsRef<str>>(
        &self,
        method: Method,
        segments: &[S],
        bearer: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        let builder = self.http.request(method, self.url(segments)?);
        Ok(match bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("Backend rejected credentials for {}", resp.url().path());
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| body.trim().to_string());
            tracing::warn!("Backend call failed with {}: {}", status, message);
            return Err(ApiError::Status { status, message });
        }

        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}
