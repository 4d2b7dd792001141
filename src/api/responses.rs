use super::{ApiClient, ApiError};
use crate::domain::models::{Analysis, Response, ResponseId, ResponseSubmission};
use reqwest::{header, Method};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SubmitReceipt {
    #[serde(default)]
    pub id: Option<ResponseId>,
}

/// The check endpoint answers either a bare boolean or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmailCheckBody {
    Flag(bool),
    Detailed {
        #[serde(alias = "exists", alias = "submitted", alias = "hasSubmitted")]
        has_submitted: bool,
    },
}

impl ApiClient {
    pub async fn submit_response(
        &self,
        bearer: Option<&str>,
        submission: &ResponseSubmission,
    ) -> Result<SubmitReceipt, ApiError> {
        let builder = self
            .request(Method::POST, &["responses"], bearer)?
            .json(submission);
        self.json(builder).await
    }

    pub async fn list_responses(&self, bearer: Option<&str>) -> Result<Vec<Response>, ApiError> {
        let builder = self.request(Method::GET, &["responses"], bearer)?;
        self.json(builder).await
    }

    pub async fn get_response(
        &self,
        bearer: Option<&str>,
        id: ResponseId,
    ) -> Result<Response, ApiError> {
        let id = id.to_string();
        let builder = self.request(Method::GET, &["responses", id.as_str()], bearer)?;
        self.json(builder).await
    }

    /// Whether `email` already has a submission on record.
    pub async fn email_has_submission(
        &self,
        bearer: Option<&str>,
        email: &str,
    ) -> Result<bool, ApiError> {
        let builder = self.request(Method::GET, &["responses", "check", email], bearer)?;
        let body: EmailCheckBody = self.json(builder).await?;
        Ok(match body {
            EmailCheckBody::Flag(flag) => flag,
            EmailCheckBody::Detailed { has_submitted } => has_submitted,
        })
    }

    pub async fn generate_analysis(
        &self,
        bearer: Option<&str>,
        id: ResponseId,
    ) -> Result<Response, ApiError> {
        let id = id.to_string();
        let builder = self.request(
            Method::POST,
            &["responses", id.as_str(), "generate-analysis"],
            bearer,
        )?;
        self.json(builder).await
    }

    /// The final analysis goes over the wire as plain text.
    pub async fn save_final_analysis(
        &self,
        bearer: Option<&str>,
        id: ResponseId,
        text: &str,
    ) -> Result<Response, ApiError> {
        let id = id.to_string();
        let builder = self
            .request(Method::PUT, &["responses", id.as_str(), "final-analysis"], bearer)?
            .header(header::CONTENT_TYPE, "text/plain")
            .body(text.to_string());
        self.json(builder).await
    }

    pub async fn get_analysis(
        &self,
        bearer: Option<&str>,
        id: ResponseId,
    ) -> Result<Analysis, ApiError> {
        let id = id.to_string();
        let builder = self.request(Method::GET, &["analysis", id.as_str()], bearer)?;
        self.json(builder).await
    }
}
