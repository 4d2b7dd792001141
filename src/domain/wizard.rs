//! Step machine behind the questionnaire pages.
//!
//! `IdentityCapture` (only when no client identity is known) → one
//! `Question(i)` per active question → `Submitting` → `Complete`. The machine
//! is pure: the page layer runs the duplicate-email check and the submit call
//! and feeds their outcomes back in.

use super::models::{
    Question, QuestionId, ResponseId, ResponseSubmission, Score, SubmittedAnswer,
};
use super::validation;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    IdentityCapture,
    Question(usize),
    Submitting,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Respondent {
    pub email: String,
    pub full_name: Option<String>,
    pub marketing_consent: bool,
}

/// Outcome of asking the backend whether an email already submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateCheck {
    Clear,
    AlreadySubmitted,
    /// The check itself failed; the flow proceeds anyway.
    Unavailable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("The questionnaire has no active questions right now.")]
    NoActiveQuestions,
    #[error("Email is required")]
    MissingEmail,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Full name is required")]
    MissingName,
    #[error("This email has already been used to submit the questionnaire.")]
    DuplicateEmail,
    #[error("Please select an answer before continuing.")]
    ScoreRequired,
    #[error("That answer is not one of the offered options.")]
    InvalidScore,
    #[error("This is the last question; submit to finish.")]
    SubmitRequired,
    #[error("That action is not available at this step.")]
    InvalidStep,
}

#[derive(Clone, Debug)]
pub struct QuestionnaireFlow {
    questions: Vec<Question>,
    captures_identity: bool,
    respondent: Option<Respondent>,
    scores: HashMap<QuestionId, Score>,
    step: Step,
    notice: Option<String>,
    response_id: Option<ResponseId>,
}

/// Local checks on the identity form; nothing here touches the network.
pub fn validate_identity(
    email: &str,
    full_name: &str,
    marketing_consent: bool,
) -> Result<Respondent, FlowError> {
    let email = validation::required(email).ok_or(FlowError::MissingEmail)?;
    if !validation::is_valid_email(email) {
        return Err(FlowError::InvalidEmail);
    }
    let full_name = validation::required(full_name).ok_or(FlowError::MissingName)?;
    Ok(Respondent {
        email: validation::normalize_email(email),
        full_name: Some(full_name.to_string()),
        marketing_consent,
    })
}

impl QuestionnaireFlow {
    /// Inactive questions are dropped and the rest ordered by `order_number`.
    /// A known client respondent skips identity capture.
    pub fn start(
        questions: Vec<Question>,
        known_respondent: Option<Respondent>,
    ) -> Result<Self, FlowError> {
        let mut questions: Vec<Question> = questions.into_iter().filter(|q| q.active).collect();
        if questions.is_empty() {
            return Err(FlowError::NoActiveQuestions);
        }
        questions.sort_by_key(|q| q.order_number);

        let captures_identity = known_respondent.is_none();
        let step = if captures_identity {
            Step::IdentityCapture
        } else {
            Step::Question(0)
        };

        Ok(Self {
            questions,
            captures_identity,
            respondent: known_respondent,
            scores: HashMap::new(),
            step,
            notice: None,
            response_id: None,
        })
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn captures_identity(&self) -> bool {
        self.captures_identity
    }

    pub fn respondent(&self) -> Option<&Respondent> {
        self.respondent.as_ref()
    }

    /// Inline message left by the last failed submit.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn response_id(&self) -> Option<ResponseId> {
        self.response_id
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.step {
            Step::Question(i) => self.questions.get(i),
            _ => None,
        }
    }

    pub fn selected(&self, question_id: QuestionId) -> Option<Score> {
        self.scores.get(&question_id).copied()
    }

    pub fn is_last_question(&self) -> bool {
        matches!(self.step, Step::Question(i) if i + 1 == self.questions.len())
    }

    pub fn accept_identity(
        &mut self,
        respondent: Respondent,
        check: DuplicateCheck,
    ) -> Result<(), FlowError> {
        if self.step != Step::IdentityCapture {
            return Err(FlowError::InvalidStep);
        }
        // keep what was typed so the form can be shown again
        self.respondent = Some(respondent);
        if check == DuplicateCheck::AlreadySubmitted {
            return Err(FlowError::DuplicateEmail);
        }
        self.notice = None;
        self.step = Step::Question(0);
        Ok(())
    }

    pub fn select(&mut self, score: Score) -> Result<(), FlowError> {
        let question = self.current_question().ok_or(FlowError::InvalidStep)?;
        if !question.choices().iter().any(|(s, _)| *s == score) {
            return Err(FlowError::InvalidScore);
        }
        let id = question.id;
        self.scores.insert(id, score);
        Ok(())
    }

    pub fn next(&mut self) -> Result<(), FlowError> {
        let Step::Question(i) = self.step else {
            return Err(FlowError::InvalidStep);
        };
        if self.selected(self.questions[i].id).is_none() {
            return Err(FlowError::ScoreRequired);
        }
        if i + 1 == self.questions.len() {
            return Err(FlowError::SubmitRequired);
        }
        self.notice = None;
        self.step = Step::Question(i + 1);
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), FlowError> {
        match self.step {
            Step::Question(0) if self.captures_identity => {
                self.step = Step::IdentityCapture;
            }
            Step::Question(i) if i > 0 => {
                self.step = Step::Question(i - 1);
            }
            _ => return Err(FlowError::InvalidStep),
        }
        self.notice = None;
        Ok(())
    }

    /// Packages one answer per active question, in display order, and moves
    /// to `Submitting`.
    pub fn begin_submit(&mut self) -> Result<ResponseSubmission, FlowError> {
        if !self.is_last_question() {
            return Err(FlowError::InvalidStep);
        }
        let respondent = self.respondent.clone().ok_or(FlowError::InvalidStep)?;

        let mut answers = Vec::with_capacity(self.questions.len());
        for (i, question) in self.questions.iter().enumerate() {
            let Some(score) = self.selected(question.id) else {
                self.step = Step::Question(i);
                return Err(FlowError::ScoreRequired);
            };
            answers.push(SubmittedAnswer {
                question_id: question.id,
                score,
            });
        }

        self.step = Step::Submitting;
        Ok(ResponseSubmission {
            email: respondent.email,
            full_name: respondent.full_name,
            marketing_consent: respondent.marketing_consent,
            answers,
        })
    }

    pub fn submission_succeeded(&mut self, response_id: Option<ResponseId>) {
        self.notice = None;
        self.response_id = response_id;
        self.step = Step::Complete;
    }

    /// Back to the final question with an inline error; the user may retry.
    pub fn submission_failed(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
        self.step = Step::Question(self.questions.len() - 1);
    }
}
