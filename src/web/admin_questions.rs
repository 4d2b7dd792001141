use crate::domain::models::{Identity, Question, QuestionDraft, QuestionId, QuestionKind, MAX_OPTIONS};
use crate::domain::validation;
use crate::services::question_manager::{next_order_number, DeleteConfirmation, QuestionManager};
use crate::state::SharedState;
use crate::web::error::{InlineResult, PageError};
use crate::web::session::AdminSession;
use crate::web::views::{self, chip, escape, Flash, Severity};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/admin/questions", get(list).post(create))
        .route("/admin/questions/new", get(new_form))
        .route("/admin/questions/:id", post(update))
        .route("/admin/questions/:id/edit", get(edit_form))
        .route("/admin/questions/:id/toggle", post(toggle))
        .route("/admin/questions/:id/delete", get(confirm_delete).post(delete))
        .with_state(state)
}

#[derive(Deserialize, Default, Clone)]
pub struct QuestionForm {
    #[serde(default)]
    question_text: String,
    #[serde(default)]
    order_number: String,
    active: Option<String>,
    #[serde(default)]
    question_type: String,
    /// One option per line.
    #[serde(default)]
    options: String,
}

impl From<&Question> for QuestionForm {
    fn from(q: &Question) -> Self {
        Self {
            question_text: q.text.clone(),
            order_number: q.order_number.to_string(),
            active: q.active.then(|| "on".to_string()),
            question_type: kind_value(q.kind).to_string(),
            options: q.options.join("\n"),
        }
    }
}

#[derive(Deserialize, Default)]
pub struct DeleteForm {
    confirm: Option<String>,
}

fn kind_value(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::MultipleChoice => "MULTIPLE_CHOICE",
        QuestionKind::Rating => "RATING",
    }
}

fn parse_draft(form: &QuestionForm) -> Result<QuestionDraft, String> {
    let question_text = validation::required(&form.question_text)
        .ok_or("Question text is required")?
        .to_string();
    let order_number = form
        .order_number
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or("Order number must be a positive whole number")?;
    let question_type = match form.question_type.as_str() {
        "MULTIPLE_CHOICE" => QuestionKind::MultipleChoice,
        _ => QuestionKind::Rating,
    };

    let options: Vec<String> = match question_type {
        QuestionKind::MultipleChoice => form
            .options
            .lines()
            .filter_map(validation::required)
            .map(str::to_string)
            .collect(),
        QuestionKind::Rating => Vec::new(),
    };
    if question_type == QuestionKind::MultipleChoice
        && !(2..=MAX_OPTIONS).contains(&options.len())
    {
        return Err(format!(
            "Multiple choice questions need between 2 and {} options",
            MAX_OPTIONS
        ));
    }

    Ok(QuestionDraft {
        question_text,
        order_number,
        active: form.active.is_some(),
        question_type,
        options,
    })
}

fn render_list(questions: &[Question], identity: &Identity, flashes: &[Flash]) -> Response {
    let rows: String = questions
        .iter()
        .map(|q| {
            let status = if q.active {
                chip("Active", "success")
            } else {
                chip("Inactive", "")
            };
            format!(
                r#"<tr><td>{}</td><td>{}</td><td>{}</td><td>{status}</td><td>
<a class="btn outline" href="/admin/questions/{id}/edit">Edit</a>
<form method="post" action="/admin/questions/{id}/toggle" style="display:inline"><button class="btn outline" type="submit">{}</button></form>
<a class="btn danger" href="/admin/questions/{id}/delete">Delete</a>
</td></tr>"#,
                q.order_number,
                escape(&q.text),
                q.kind.label(),
                if q.active { "Deactivate" } else { "Activate" },
                id = q.id,
            )
        })
        .collect();

    let table = if questions.is_empty() {
        views::alert(Severity::Info, "No questions yet.")
    } else {
        format!(
            "<table><thead><tr><th>Order</th><th>Question</th><th>Type</th><th>Status</th><th></th></tr></thead><tbody>{rows}</tbody></table>"
        )
    };

    let body = format!(
        r#"{}<p><a class="btn" href="/admin/questions/new">Add question</a></p><div class="card">{table}</div>"#,
        flashes.iter().map(Flash::render).collect::<String>()
    );
    views::page("Questions", Some(identity), &body).into_response()
}

fn render_form(
    title: &str,
    action: &str,
    form: &QuestionForm,
    identity: &Identity,
    error: Option<&str>,
) -> Response {
    let selected = |value: &str| {
        if form.question_type == value {
            " selected"
        } else {
            ""
        }
    };
    let body = format!(
        r#"<div class="card">{}
<form method="post" action="{}">
<label for="question_text">Question text</label>
<textarea id="question_text" name="question_text" rows="3" required>{}</textarea>
<label for="order_number">Order number</label>
<input type="number" id="order_number" name="order_number" min="1" value="{}" required>
<label for="question_type">Type</label>
<select id="question_type" name="question_type">
<option value="RATING"{}>Rating (1-5)</option>
<option value="MULTIPLE_CHOICE"{}>Multiple choice</option>
</select>
<label for="options">Options (multiple choice, one per line, up to {MAX_OPTIONS})</label>
<textarea id="options" name="options" rows="5">{}</textarea>
<label class="choice"><input type="checkbox" name="active" value="on"{}> Active</label>
<div class="actions"><a class="btn outline" href="/admin/questions">Cancel</a><button class="btn" type="submit">Save</button></div>
</form></div>"#,
        error
            .map(|e| views::alert(Severity::Error, e))
            .unwrap_or_default(),
        escape(action),
        escape(&form.question_text),
        escape(&form.order_number),
        selected("RATING"),
        selected("MULTIPLE_CHOICE"),
        escape(&form.options),
        if form.active.is_some() { " checked" } else { "" }
    );
    views::page(title, Some(identity), &body).into_response()
}

/// Re-fetches the list and renders it under `notice`. A failed fetch adds its
/// own error below the notice.
async fn list_page(
    manager: &QuestionManager<'_>,
    identity: &Identity,
    notice: Option<Flash>,
) -> Result<Response, PageError> {
    let mut flashes: Vec<Flash> = notice.into_iter().collect();
    let questions = match manager.list().await.inline()? {
        Ok(questions) => questions,
        Err(e) => {
            tracing::warn!("Failed to load questions: {}", e);
            flashes.push(Flash::error(e.user_message("Failed to load questions")));
            Vec::new()
        }
    };
    Ok(render_list(&questions, identity, &flashes))
}

async fn find_question(
    manager: &QuestionManager<'_>,
    id: QuestionId,
) -> Result<Question, PageError> {
    manager
        .list()
        .await?
        .into_iter()
        .find(|q| q.id == id)
        .ok_or_else(|| PageError::NotFound(format!("Question {} does not exist", id)))
}

async fn list(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
) -> Result<Response, PageError> {
    let manager = QuestionManager::new(&state.api, &identity.credential);
    list_page(&manager, &identity, None).await
}

async fn new_form(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
) -> Result<Response, PageError> {
    let manager = QuestionManager::new(&state.api, &identity.credential);
    let order = match manager.list().await.inline()? {
        Ok(questions) => next_order_number(&questions),
        Err(_) => 1,
    };
    let form = QuestionForm {
        order_number: order.to_string(),
        active: Some("on".to_string()),
        question_type: kind_value(QuestionKind::Rating).to_string(),
        ..QuestionForm::default()
    };
    Ok(render_form("New question", "/admin/questions", &form, &identity, None))
}

async fn create(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Form(form): Form<QuestionForm>,
) -> Result<Response, PageError> {
    let draft = match parse_draft(&form) {
        Ok(draft) => draft,
        Err(message) => {
            return Ok(render_form("New question", "/admin/questions", &form, &identity, Some(&message)))
        }
    };

    let manager = QuestionManager::new(&state.api, &identity.credential);
    match manager.create(&draft).await.inline()? {
        Ok(_) => list_page(&manager, &identity, Some(Flash::success("Question created"))).await,
        Err(e) => {
            let message = e.user_message("Failed to create question");
            Ok(render_form("New question", "/admin/questions", &form, &identity, Some(&message)))
        }
    }
}

async fn edit_form(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<QuestionId>,
) -> Result<Response, PageError> {
    let manager = QuestionManager::new(&state.api, &identity.credential);
    let question = find_question(&manager, id).await?;
    let action = format!("/admin/questions/{id}");
    Ok(render_form(
        "Edit question",
        &action,
        &QuestionForm::from(&question),
        &identity,
        None,
    ))
}

async fn update(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<QuestionId>,
    Form(form): Form<QuestionForm>,
) -> Result<Response, PageError> {
    let action = format!("/admin/questions/{id}");
    let draft = match parse_draft(&form) {
        Ok(draft) => draft,
        Err(message) => {
            return Ok(render_form("Edit question", &action, &form, &identity, Some(&message)))
        }
    };

    let manager = QuestionManager::new(&state.api, &identity.credential);
    match manager.update(id, &draft).await.inline()? {
        Ok(_) => list_page(&manager, &identity, Some(Flash::success("Question updated"))).await,
        Err(e) => {
            let message = e.user_message("Failed to update question");
            Ok(render_form("Edit question", &action, &form, &identity, Some(&message)))
        }
    }
}

async fn toggle(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<QuestionId>,
) -> Result<Response, PageError> {
    let manager = QuestionManager::new(&state.api, &identity.credential);
    let flash = match manager.toggle(id).await.inline()? {
        Ok(_) => Flash::success("Question status updated"),
        Err(e) => Flash::error(e.user_message("Failed to update question status")),
    };
    list_page(&manager, &identity, Some(flash)).await
}

async fn confirm_delete(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<QuestionId>,
) -> Result<Response, PageError> {
    let manager = QuestionManager::new(&state.api, &identity.credential);
    let question = find_question(&manager, id).await?;
    let body = format!(
        r#"<div class="card">
<p>Are you sure you want to delete this question?</p>
<p><strong>{}</strong></p>
<form method="post" action="/admin/questions/{id}/delete">
<input type="hidden" name="confirm" value="yes">
<div class="actions"><a class="btn outline" href="/admin/questions">Cancel</a><button class="btn danger" type="submit">Delete</button></div>
</form></div>"#,
        escape(&question.text)
    );
    Ok(views::page("Delete question", Some(&identity), &body).into_response())
}

async fn delete(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<QuestionId>,
    Form(form): Form<DeleteForm>,
) -> Result<Response, PageError> {
    let Some(confirmation) = DeleteConfirmation::from_form(id, form.confirm.as_deref()) else {
        return Ok(Redirect::to(&format!("/admin/questions/{id}/delete")).into_response());
    };

    let manager = QuestionManager::new(&state.api, &identity.credential);
    let flash = match manager.delete(confirmation).await.inline()? {
        Ok(()) => Flash::success("Question deleted"),
        Err(e) => Flash::error(e.user_message("Failed to delete question")),
    };
    list_page(&manager, &identity, Some(flash)).await
}
