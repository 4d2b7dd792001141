use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type QuestionId = i64;
pub type ResponseId = i64;

/// Highest number of multiple-choice options offered; option `i` scores `i + 1`.
pub const MAX_OPTIONS: usize = 5;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Client => "CLIENT",
        }
    }

    /// Landing page after login for this role.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Admin => "/",
            Role::Client => "/questionnaire",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ADMIN" => Ok(Role::Admin),
            "CLIENT" => Ok(Role::Client),
            _ => Err(()),
        }
    }
}

/// The authenticated party behind a session.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub role: Role,
    /// Username for admins, email for clients.
    pub handle: String,
    pub full_name: Option<String>,
    pub marketing_consent: bool,
    pub credential: String,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.handle)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("role", &self.role)
            .field("handle", &self.handle)
            .field("full_name", &self.full_name)
            .field("marketing_consent", &self.marketing_consent)
            .field("credential", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    MultipleChoice,
    #[default]
    Rating,
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "Multiple choice",
            QuestionKind::Rating => "Rating",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub order_number: i32,
    #[serde(rename = "questionText")]
    pub text: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(rename = "questionType", default)]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

fn default_active() -> bool {
    true
}

impl Question {
    /// Score choices shown for this question as `(score, label)`.
    pub fn choices(&self) -> Vec<(Score, String)> {
        match self.kind {
            QuestionKind::MultipleChoice if !self.options.is_empty() => self
                .options
                .iter()
                .take(MAX_OPTIONS)
                .enumerate()
                .filter_map(|(i, label)| Score::new(i as u8 + 1).map(|s| (s, label.clone())))
                .collect(),
            _ => Score::all().map(|s| (s, s.get().to_string())).collect(),
        }
    }
}

/// Body for creating or updating a question.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub question_text: String,
    pub order_number: i32,
    pub active: bool,
    pub question_type: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl From<&Question> for QuestionDraft {
    fn from(q: &Question) -> Self {
        Self {
            question_text: q.text.clone(),
            order_number: q.order_number,
            active: q.active,
            question_type: q.kind,
            options: q.options.clone(),
        }
    }
}

/// A rating in `1..=5`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Score(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Score> {
        (Self::MIN..=Self::MAX).map(Score)
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Score::new(value).ok_or_else(|| format!("score {value} outside 1-5"))
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub id: QuestionId,
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub order_number: Option<i32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(default)]
    pub question: Option<AnsweredQuestion>,
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    pub score: Score,
}

impl Answer {
    pub fn question_text(&self) -> &str {
        self.question
            .as_ref()
            .and_then(|q| q.question_text.as_deref())
            .unwrap_or("Question text not available")
    }

    fn order_key(&self) -> i32 {
        self.question
            .as_ref()
            .and_then(|q| q.order_number)
            .unwrap_or(i32::MAX)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: ResponseId,
    pub user_email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub marketing_consent: bool,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub ai_analysis: Option<String>,
    #[serde(default)]
    pub final_analysis: Option<String>,
}

impl Response {
    pub fn has_ai_analysis(&self) -> bool {
        self.ai_analysis
            .as_deref()
            .map(|a| !a.trim().is_empty())
            .unwrap_or(false)
    }

    /// Answers by ascending question order; answers without a known order keep
    /// their relative position at the end.
    pub fn ordered_answers(&self) -> Vec<&Answer> {
        let mut answers: Vec<&Answer> = self.answers.iter().collect();
        answers.sort_by_key(|a| a.order_key());
        answers
    }

    /// Text to prefill the final-analysis editor with.
    pub fn analysis_draft(&self) -> &str {
        self.final_analysis
            .as_deref()
            .filter(|a| !a.is_empty())
            .or(self.ai_analysis.as_deref())
            .unwrap_or("")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub score: Score,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSubmission {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub marketing_consent: bool,
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub insights: Vec<AnalysisItem>,
    #[serde(default)]
    pub recommendations: Vec<AnalysisItem>,
}
