use crate::api::{ApiClient, ApiError};
use crate::domain::models::{Question, QuestionDraft, QuestionId};

/// Proof that the admin went through the delete confirmation page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteConfirmation(QuestionId);

impl DeleteConfirmation {
    pub fn from_form(id: QuestionId, confirm: Option<&str>) -> Option<Self> {
        matches!(confirm, Some("yes")).then_some(DeleteConfirmation(id))
    }
}

/// Admin operations on the question catalogue. Mutations return the backend's
/// answer alone; the caller re-fetches the list with [`QuestionManager::list`].
pub struct QuestionManager<'a> {
    api: &'a ApiClient,
    bearer: &'a str,
}

impl<'a> QuestionManager<'a> {
    pub fn new(api: &'a ApiClient, bearer: &'a str) -> Self {
        Self { api, bearer }
    }

    /// All questions, inactive included, by ascending order number.
    pub async fn list(&self) -> Result<Vec<Question>, ApiError> {
        let mut questions = self.api.all_questions(Some(self.bearer)).await?;
        questions.sort_by_key(|q| (q.order_number, q.id));
        Ok(questions)
    }

    pub async fn create(&self, draft: &QuestionDraft) -> Result<Question, ApiError> {
        let created = self.api.create_question(Some(self.bearer), draft).await?;
        tracing::info!("Question {} created", created.id);
        Ok(created)
    }

    pub async fn update(&self, id: QuestionId, draft: &QuestionDraft) -> Result<Question, ApiError> {
        let updated = self.api.update_question(Some(self.bearer), id, draft).await?;
        tracing::info!("Question {} updated", id);
        Ok(updated)
    }

    pub async fn toggle(&self, id: QuestionId) -> Result<Question, ApiError> {
        let toggled = self.api.toggle_question(Some(self.bearer), id).await?;
        tracing::info!("Question {} is now active={}", id, toggled.active);
        Ok(toggled)
    }

    pub async fn delete(&self, confirmation: DeleteConfirmation) -> Result<(), ApiError> {
        let DeleteConfirmation(id) = confirmation;
        self.api.delete_question(Some(self.bearer), id).await?;
        tracing::info!("Question {} deleted", id);
        Ok(())
    }
}

/// Order number proposed for a new question: one past the last.
pub fn next_order_number(questions: &[Question]) -> i32 {
    questions
        .iter()
        .map(|q| q.order_number)
        .max()
        .map(|n| n.saturating_add(1))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::QuestionKind;
    use crate::test_support::{FakeBackend, ADMIN_TOKEN};

    #[tokio::test]
    async fn test_list_sorted_by_order() {
        let backend = FakeBackend::spawn().await;
        let api = backend.client();
        let manager = QuestionManager::new(&api, ADMIN_TOKEN);

        let list = manager.list().await.unwrap();
        let orders: Vec<i32> = list.iter().map(|q| q.order_number).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(next_order_number(&list), 4);
        assert_eq!(next_order_number(&[]), 1);
    }

    #[test]
    fn test_next_order_number_saturates() {
        let mut question = Question {
            id: 1,
            order_number: i32::MAX,
            text: "Last".to_string(),
            active: true,
            kind: QuestionKind::Rating,
            options: Vec::new(),
        };
        assert_eq!(next_order_number(std::slice::from_ref(&question)), i32::MAX);
        question.order_number = 7;
        assert_eq!(next_order_number(&[question]), 8);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let backend = FakeBackend::spawn().await;
        let api = backend.client();
        let manager = QuestionManager::new(&api, ADMIN_TOKEN);

        let before = manager.list().await.unwrap();
        let original = before.iter().find(|q| q.id == 1).unwrap().active;

        let once = manager.toggle(1).await.unwrap();
        assert_eq!(once.active, !original);

        manager.toggle(1).await.unwrap();
        let after = manager.list().await.unwrap();
        assert_eq!(after.iter().find(|q| q.id == 1).unwrap().active, original);
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation_and_removes() {
        let backend = FakeBackend::spawn().await;
        let api = backend.client();
        let manager = QuestionManager::new(&api, ADMIN_TOKEN);

        assert!(DeleteConfirmation::from_form(2, None).is_none());
        assert!(DeleteConfirmation::from_form(2, Some("no")).is_none());

        let confirmation = DeleteConfirmation::from_form(2, Some("yes")).unwrap();
        manager.delete(confirmation).await.unwrap();
        let refetched = manager.list().await.unwrap();
        assert!(refetched.iter().all(|q| q.id != 2));
    }

    #[tokio::test]
    async fn test_create_and_update_refresh_list() {
        let backend = FakeBackend::spawn().await;
        let api = backend.client();
        let manager = QuestionManager::new(&api, ADMIN_TOKEN);

        let draft = QuestionDraft {
            question_text: "Do you smoke?".to_string(),
            order_number: next_order_number(&manager.list().await.unwrap()),
            active: true,
            question_type: QuestionKind::Rating,
            options: Vec::new(),
        };
        let created = manager.create(&draft).await.unwrap();
        assert_eq!(created.text, "Do you smoke?");
        let list = manager.list().await.unwrap();
        assert_eq!(list.last().map(|q| q.id), Some(created.id));

        let mut edit = QuestionDraft::from(&created);
        edit.active = false;
        manager.update(created.id, &edit).await.unwrap();
        let list = manager.list().await.unwrap();
        assert!(!list.iter().find(|q| q.id == created.id).unwrap().active);

        let duplicate_order = QuestionDraft {
            order_number: 1,
            ..draft
        };
        let err = manager.create(&duplicate_order).await.unwrap_err();
        assert_eq!(err.user_message("Failed"), "Order number already in use");
    }
}
