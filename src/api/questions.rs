use super::{ApiClient, ApiError};
use crate::domain::models::{Question, QuestionDraft, QuestionId};
use reqwest::Method;

impl ApiClient {
    /// Questions shown to respondents.
    pub async fn active_questions(&self, bearer: Option<&str>) -> Result<Vec<Question>, ApiError> {
        let builder = self.request(Method::GET, &["questions", "active"], bearer)?;
        self.json(builder).await
    }

    /// Full catalogue, inactive questions included.
    pub async fn all_questions(&self, bearer: Option<&str>) -> Result<Vec<Question>, ApiError> {
        let builder = self.request(Method::GET, &["questions", "all"], bearer)?;
        self.json(builder).await
    }

    pub async fn create_question(
        &self,
        bearer: Option<&str>,
        draft: &QuestionDraft,
    ) -> Result<Question, ApiError> {
        let builder = self.request(Method::POST, &["questions"], bearer)?.json(draft);
        self.json(builder).await
    }

    pub async fn update_question(
        &self,
        bearer: Option<&str>,
        id: QuestionId,
        draft: &QuestionDraft,
    ) -> Result<Question, ApiError> {
        let id = id.to_string();
        let builder = self
            .request(Method::PUT, &["questions", id.as_str()], bearer)?
            .json(draft);
        self.json(builder).await
    }

    pub async fn toggle_question(
        &self,
        bearer: Option<&str>,
        id: QuestionId,
    ) -> Result<Question, ApiError> {
        let id = id.to_string();
        let builder = self.request(Method::PATCH, &["questions", id.as_str(), "toggle"], bearer)?;
        self.json(builder).await
    }

    pub async fn delete_question(&self, bearer: Option<&str>, id: QuestionId) -> Result<(), ApiError> {
        let id = id.to_string();
        let builder = self.request(Method::DELETE, &["questions", id.as_str()], bearer)?;
        self.send(builder).await?;
        Ok(())
    }
}
