use crate::domain::models::{Identity, Response as QuestionnaireResponse, ResponseId};
use crate::state::SharedState;
use crate::web::error::{InlineResult, PageError};
use crate::web::session::AdminSession;
use crate::web::views::{self, chip, escape, flash_html, Flash, Severity};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/admin/responses", get(list))
        .route("/admin/responses/:id", get(detail))
        .route("/admin/responses/:id/analysis", post(generate_analysis))
        .route("/admin/responses/:id/final-analysis", post(save_final_analysis))
        .with_state(state)
}

#[derive(Deserialize, Default)]
pub struct FinalAnalysisForm {
    #[serde(default)]
    final_analysis: String,
}

async fn list(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
) -> Result<Response, PageError> {
    let body = match state
        .api
        .list_responses(Some(identity.credential.as_str()))
        .await
        .inline()?
    {
        Ok(responses) if responses.is_empty() => {
            views::alert(Severity::Info, "No responses have been submitted yet.")
        }
        Ok(responses) => {
            let rows: String = responses
                .iter()
                .map(|r| {
                    format!(
                        r#"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><a class="btn outline" href="/admin/responses/{}">View</a></td></tr>"#,
                        escape(&r.user_email),
                        escape(r.full_name.as_deref().unwrap_or("-")),
                        state.display_zone.format(r.submitted_at),
                        if r.marketing_consent {
                            chip("Yes", "success")
                        } else {
                            chip("No", "")
                        },
                        if r.has_ai_analysis() {
                            chip("Generated", "info")
                        } else {
                            chip("Pending", "warning")
                        },
                        r.id
                    )
                })
                .collect();
            format!(
                r#"<div class="card"><table><thead><tr><th>Email</th><th>Name</th><th>Submitted</th><th>Marketing</th><th>AI analysis</th><th></th></tr></thead><tbody>{rows}</tbody></table></div>"#
            )
        }
        Err(e) => {
            tracing::warn!("Failed to load responses: {}", e);
            views::alert(Severity::Error, &e.user_message("Failed to load responses"))
        }
    };
    Ok(views::page("Responses", Some(&identity), &body).into_response())
}

fn render_detail(
    state: &SharedState,
    identity: &Identity,
    response: &QuestionnaireResponse,
    flash: Option<&Flash>,
    typed_final: Option<&str>,
) -> Response {
    let answers: String = response
        .ordered_answers()
        .into_iter()
        .map(|a| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape(a.question_text()),
                a.score.get()
            )
        })
        .collect();

    let ai = match response.ai_analysis.as_deref().filter(|_| response.has_ai_analysis()) {
        Some(text) => format!("<pre>{}</pre>", escape(text)),
        None => views::alert(Severity::Info, "No AI analysis has been generated yet."),
    };
    let generate_label = if response.has_ai_analysis() {
        "Regenerate analysis"
    } else {
        "Generate analysis"
    };

    let body = format!(
        r#"{}
<p><a href="/admin/responses">&larr; All responses</a></p>
<div class="card">
<table>
<tr><th>Email</th><td>{}</td></tr>
<tr><th>Name</th><td>{}</td></tr>
<tr><th>Submitted</th><td>{}</td></tr>
<tr><th>Marketing consent</th><td>{}</td></tr>
</table>
</div>
<div class="card"><h2>Answers</h2>
<table><thead><tr><th>Question</th><th>Score</th></tr></thead><tbody>{answers}</tbody></table>
</div>
<div class="card"><h2>AI analysis</h2>
{ai}
<form method="post" action="/admin/responses/{id}/analysis"><button class="btn" type="submit">{generate_label}</button></form>
</div>
{}"#,
        flash_html(flash),
        escape(&response.user_email),
        escape(response.full_name.as_deref().unwrap_or("-")),
        state.display_zone.format(response.submitted_at),
        if response.marketing_consent { "Yes" } else { "No" },
        final_editor(response.id, typed_final.unwrap_or(response.analysis_draft())),
        id = response.id,
    );
    views::page("Response", Some(identity), &body).into_response()
}

fn final_editor(id: ResponseId, text: &str) -> String {
    format!(
        r#"<div class="card"><h2>Final analysis</h2>
<form method="post" action="/admin/responses/{id}/final-analysis">
<textarea name="final_analysis" rows="10">{}</textarea>
<div class="actions"><span></span><button class="btn" type="submit">Save final analysis</button></div>
</form>
</div>"#,
        escape(text)
    )
}

/// Detail page after a failed action. When the response cannot be reloaded
/// either, only the editor is shown, still holding `typed_final`.
async fn detail_after_failure(
    state: &SharedState,
    identity: &Identity,
    id: ResponseId,
    flash: Flash,
    typed_final: Option<&str>,
) -> Result<Response, PageError> {
    let reloaded = state
        .api
        .get_response(Some(identity.credential.as_str()), id)
        .await
        .inline()?;
    match reloaded {
        Ok(response) => Ok(render_detail(state, identity, &response, Some(&flash), typed_final)),
        Err(e) => {
            tracing::warn!("Failed to reload response {}: {}", id, e);
            let body = format!(
                r#"{}{}
<p><a href="/admin/responses">&larr; All responses</a></p>
{}"#,
                flash.render(),
                views::alert(Severity::Error, &e.user_message("Failed to load response")),
                final_editor(id, typed_final.unwrap_or_default())
            );
            Ok(views::page("Response", Some(identity), &body).into_response())
        }
    }
}

async fn detail(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<ResponseId>,
) -> Result<Response, PageError> {
    let response = state
        .api
        .get_response(Some(identity.credential.as_str()), id)
        .await?;
    Ok(render_detail(&state, &identity, &response, None, None))
}

async fn generate_analysis(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<ResponseId>,
) -> Result<Response, PageError> {
    let bearer = Some(identity.credential.as_str());
    let flash = match state.api.generate_analysis(bearer, id).await.inline()? {
        Ok(response) => {
            tracing::info!("AI analysis generated for response {}", id);
            return Ok(render_detail(
                &state,
                &identity,
                &response,
                Some(&Flash::success("AI analysis generated")),
                None,
            ));
        }
        Err(e) => Flash::error(e.user_message("Failed to generate analysis")),
    };
    detail_after_failure(&state, &identity, id, flash, None).await
}

async fn save_final_analysis(
    State(state): State<SharedState>,
    AdminSession(identity): AdminSession,
    Path(id): Path<ResponseId>,
    Form(form): Form<FinalAnalysisForm>,
) -> Result<Response, PageError> {
    let bearer = Some(identity.credential.as_str());
    let flash = match state
        .api
        .save_final_analysis(bearer, id, &form.final_analysis)
        .await
        .inline()?
    {
        Ok(response) => {
            tracing::info!("Final analysis saved for response {}", id);
            return Ok(render_detail(
                &state,
                &identity,
                &response,
                Some(&Flash::success("Final analysis saved")),
                None,
            ));
        }
        Err(e) => Flash::error(e.user_message("Failed to save final analysis")),
    };
    // the typed text survives a failed save
    detail_after_failure(&state, &identity, id, flash, Some(&form.final_analysis)).await
}
