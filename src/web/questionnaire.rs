use crate::domain::models::{Identity, Role, Score};
use crate::domain::wizard::{
    self, DuplicateCheck, FlowError, QuestionnaireFlow, Respondent, Step,
};
use crate::state::{SharedState, Visit};
use crate::web::error::{InlineResult, PageError};
use crate::web::session::{CurrentSession, SessionState};
use crate::web::views::{self, escape, Severity};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

pub const VISIT_TTL_HOURS: i64 = 2;

const SUBMIT_FAILED: &str = "Failed to submit questionnaire. Please try again.";

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/questionnaire", get(start))
        .route("/questionnaire/:visit", post(advance))
        .with_state(state)
}

#[derive(Deserialize, Default)]
pub struct WizardForm {
    #[serde(default)]
    action: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    full_name: String,
    marketing_consent: Option<String>,
    score: Option<String>,
}

/// A logged-in client answers as themselves.
fn known_respondent(identity: Option<&Identity>) -> Option<Respondent> {
    identity
        .filter(|i| i.role == Role::Client)
        .map(|i| Respondent {
            email: i.handle.clone(),
            full_name: i.full_name.clone(),
            marketing_consent: i.marketing_consent,
        })
}

fn parse_score(raw: Option<&str>) -> Result<Option<Score>, FlowError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u8>()
            .ok()
            .and_then(Score::new)
            .map(Some)
            .ok_or(FlowError::InvalidScore),
    }
}

async fn save_visit(state: &SharedState, visit_id: Uuid, flow: QuestionnaireFlow) {
    let mut visits = state.visits.write().await;
    visits.insert(
        visit_id,
        Visit {
            flow,
            expires_at: Utc::now() + Duration::hours(VISIT_TTL_HOURS),
        },
    );
}

async fn start(
    State(state): State<SharedState>,
    session: CurrentSession,
) -> Result<Response, PageError> {
    if matches!(session.state, SessionState::Loading) {
        return Ok(views::loading_page());
    }
    let identity = session.identity();

    let questions = match state.api.active_questions(session.bearer()).await.inline()? {
        Ok(questions) => questions,
        Err(e) => {
            tracing::warn!("Failed to load questions: {}", e);
            return Ok(views::message_page(
                StatusCode::BAD_GATEWAY,
                "Questionnaire",
                identity,
                "Failed to load questions. Please try again later.",
                Some(("/questionnaire", "Try again")),
            ));
        }
    };

    let flow = match QuestionnaireFlow::start(questions, known_respondent(identity)) {
        Ok(flow) => flow,
        Err(e) => {
            return Ok(views::message_page(
                StatusCode::OK,
                "Questionnaire",
                identity,
                &e.to_string(),
                None,
            ))
        }
    };

    let visit_id = Uuid::new_v4();
    let page = render_flow(visit_id, &flow, identity, None, None);
    save_visit(&state, visit_id, flow).await;
    tracing::debug!("Questionnaire visit {} opened", visit_id);
    Ok(page)
}

async fn advance(
    State(state): State<SharedState>,
    session: CurrentSession,
    Path(visit_id): Path<Uuid>,
    Form(form): Form<WizardForm>,
) -> Result<Response, PageError> {
    if matches!(session.state, SessionState::Loading) {
        return Ok(views::loading_page());
    }
    let identity = session.identity();

    let visit = {
        let visits = state.visits.read().await;
        visits.get(&visit_id).cloned()
    };
    let Some(Visit { mut flow, .. }) = visit else {
        return Ok(views::message_page(
            StatusCode::GONE,
            "Questionnaire",
            identity,
            "This questionnaire session has expired. Please start again.",
            Some(("/questionnaire", "Start again")),
        ));
    };

    let outcome = match form.action.as_str() {
        "identity" => {
            match wizard::validate_identity(
                &form.email,
                &form.full_name,
                form.marketing_consent.is_some(),
            ) {
                Err(e) => {
                    let typed = IdentityFields::from_form(&form);
                    return Ok(render_flow(visit_id, &flow, identity, Some(&e.to_string()), Some(typed)));
                }
                Ok(respondent) => {
                    let check = match state
                        .api
                        .email_has_submission(session.bearer(), &respondent.email)
                        .await
                        .inline()?
                    {
                        Ok(true) => DuplicateCheck::AlreadySubmitted,
                        Ok(false) => DuplicateCheck::Clear,
                        Err(e) => {
                            tracing::warn!("Duplicate email check unavailable: {}", e);
                            DuplicateCheck::Unavailable
                        }
                    };
                    flow.accept_identity(respondent, check)
                }
            }
        }
        "next" => parse_score(form.score.as_deref()).and_then(|score| {
            if let Some(score) = score {
                flow.select(score)?;
            }
            flow.next()
        }),
        "back" => {
            // keep a choice made before going back
            let kept = parse_score(form.score.as_deref()).and_then(|score| match score {
                Some(score) => flow.select(score),
                None => Ok(()),
            });
            if let Err(e) = kept {
                tracing::debug!("Choice dropped on back in visit {}: {}", visit_id, e);
            }
            flow.back()
        }
        "submit" => {
            let packaged = parse_score(form.score.as_deref()).and_then(|score| {
                if let Some(score) = score {
                    flow.select(score)?;
                }
                flow.begin_submit()
            });
            match packaged {
                Err(e) => Err(e),
                // Submitting is never stored; the saved visit stays on the last question
                Ok(submission) => {
                    match state
                        .api
                        .submit_response(session.bearer(), &submission)
                        .await
                        .inline()?
                    {
                        Ok(receipt) => {
                            flow.submission_succeeded(receipt.id);
                            state.visits.write().await.remove(&visit_id);
                            tracing::info!(
                                "Questionnaire submitted with {} answers",
                                submission.answers.len()
                            );
                            return Ok(render_flow(visit_id, &flow, identity, None, None));
                        }
                        Err(e) => {
                            tracing::warn!("Questionnaire submission failed: {}", e);
                            flow.submission_failed(SUBMIT_FAILED);
                            Ok(())
                        }
                    }
                }
            }
        }
        other => {
            return Err(PageError::BadRequest(format!("Unknown action '{}'", other)));
        }
    };

    let error = outcome.err().map(|e| e.to_string());
    let page = render_flow(visit_id, &flow, identity, error.as_deref(), None);
    save_visit(&state, visit_id, flow).await;
    Ok(page)
}

/// Drops visits idle past their expiry.
pub async fn sweep_expired_visits(state: &SharedState) -> usize {
    let now = Utc::now();
    let mut visits = state.visits.write().await;
    let before = visits.len();
    visits.retain(|_, visit| visit.expires_at > now);
    before - visits.len()
}

struct IdentityFields {
    email: String,
    full_name: String,
    marketing_consent: bool,
}

impl IdentityFields {
    fn from_form(form: &WizardForm) -> Self {
        Self {
            email: form.email.clone(),
            full_name: form.full_name.clone(),
            marketing_consent: form.marketing_consent.is_some(),
        }
    }

    fn from_flow(flow: &QuestionnaireFlow) -> Self {
        match flow.respondent() {
            Some(r) => Self {
                email: r.email.clone(),
                full_name: r.full_name.clone().unwrap_or_default(),
                marketing_consent: r.marketing_consent,
            },
            None => Self {
                email: String::new(),
                full_name: String::new(),
                marketing_consent: false,
            },
        }
    }
}

fn stepper(flow: &QuestionnaireFlow) -> String {
    let position = match flow.step() {
        Step::IdentityCapture => 0,
        Step::Question(i) => i + 1,
        Step::Submitting | Step::Complete => flow.questions().len() + 1,
    };
    let mut labels = Vec::with_capacity(flow.questions().len() + 1);
    if flow.captures_identity() {
        labels.push((0, "Your details".to_string()));
    }
    for i in 0..flow.questions().len() {
        labels.push((i + 1, format!("Question {}", i + 1)));
    }
    let spans: String = labels
        .into_iter()
        .map(|(at, label)| {
            let class = if at == position {
                "active"
            } else if at < position {
                "done"
            } else {
                ""
            };
            format!(r#"<span class="{class}">{label}</span>"#)
        })
        .collect();
    format!(r#"<div class="steps">{spans}</div>"#)
}

fn render_flow(
    visit_id: Uuid,
    flow: &QuestionnaireFlow,
    identity: Option<&Identity>,
    error: Option<&str>,
    typed: Option<IdentityFields>,
) -> Response {
    let alert = error
        .or(flow.notice())
        .map(|message| views::alert(Severity::Error, message))
        .unwrap_or_default();
    let action = format!("/questionnaire/{visit_id}");

    let content = match flow.step() {
        Step::IdentityCapture => {
            let fields = typed.unwrap_or_else(|| IdentityFields::from_flow(flow));
            format!(
                r#"<p>Please tell us who you are before starting.</p>
<form method="post" action="{action}">
<label for="email">Email</label>
<input type="email" id="email" name="email" value="{}" required>
<label for="full_name">Full name</label>
<input type="text" id="full_name" name="full_name" value="{}" required>
<label class="choice"><input type="checkbox" name="marketing_consent" value="on"{}> I agree to receive news and offers by email</label>
<div class="actions"><button class="btn outline" type="button" disabled>Back</button><button class="btn" type="submit" name="action" value="identity">Next</button></div>
</form>"#,
                escape(&fields.email),
                escape(&fields.full_name),
                if fields.marketing_consent { " checked" } else { "" }
            )
        }
        Step::Question(i) => {
            let Some(question) = flow.current_question() else {
                return views::message_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Questionnaire",
                    identity,
                    "This question is no longer available.",
                    Some(("/questionnaire", "Start again")),
                );
            };
            let selected = flow.selected(question.id);
            let choices: String = question
                .choices()
                .into_iter()
                .map(|(score, label)| {
                    format!(
                        r#"<label class="choice"><input type="radio" name="score" value="{}"{}> {}</label>"#,
                        score.get(),
                        if selected == Some(score) { " checked" } else { "" },
                        escape(&label)
                    )
                })
                .collect();
            let can_go_back = i > 0 || flow.captures_identity();
            let forward = if flow.is_last_question() {
                r#"<button class="btn" type="submit" name="action" value="submit">Submit</button>"#
            } else {
                r#"<button class="btn" type="submit" name="action" value="next">Next</button>"#
            };
            format!(
                r#"<p>Question {} of {}</p>
<form method="post" action="{action}">
<h2>{}</h2>
{choices}
<div class="actions"><button class="btn outline" type="submit" name="action" value="back"{}>Back</button>{forward}</div>
</form>"#,
                i + 1,
                flow.questions().len(),
                escape(&question.text),
                if can_go_back { "" } else { " disabled" }
            )
        }
        Step::Submitting => "<p>Submitting your answers...</p>".to_string(),
        Step::Complete => {
            let results = match (identity, flow.response_id()) {
                (Some(_), Some(id)) => format!(
                    r#"<p><a class="btn" href="/results/{id}">View your results</a></p>"#
                ),
                _ => String::new(),
            };
            format!(
                r#"<h2>Thank you!</h2>
<p>Your answers have been submitted. Our team will review them and get back to you.</p>
{results}"#
            )
        }
    };

    let body = format!(
        r#"<div class="card">{}{alert}{content}</div>"#,
        if flow.step() == Step::Complete {
            String::new()
        } else {
            stepper(flow)
        }
    );
    views::page("Questionnaire", identity, &body).into_response()
}
