use crate::domain::models::{AnalysisItem, Identity, ResponseId, Role};
use crate::state::SharedState;
use crate::web::error::{InlineResult, PageError};
use crate::web::session::Authenticated;
use crate::web::views::{self, escape, Severity};
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Router,
};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(home))
        .route("/results/:id", get(results))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Unknown paths land on the home page.
pub async fn fallback() -> impl IntoResponse {
    Redirect::to("/")
}

async fn home(
    State(state): State<SharedState>,
    Authenticated(identity): Authenticated,
) -> Result<Html<String>, PageError> {
    let body = match identity.role {
        Role::Admin => admin_overview(&state, &identity).await?,
        Role::Client => format!(
            r#"<div class="card">
<p>Welcome, {}.</p>
<p>The questionnaire takes a few minutes. Your answers are reviewed by our team.</p>
<p><a class="btn" href="/questionnaire">Start the questionnaire</a></p>
</div>"#,
            escape(identity.display_name())
        ),
    };
    Ok(views::page("Home", Some(&identity), &body))
}

async fn admin_overview(state: &SharedState, identity: &Identity) -> Result<String, PageError> {
    let bearer = Some(identity.credential.as_str());
    let counts = futures::try_join!(
        state.api.all_questions(bearer),
        state.api.list_responses(bearer)
    )
    .inline()?;

    let stats = match counts {
        Ok((questions, responses)) => {
            let active = questions.iter().filter(|q| q.active).count();
            let pending = responses.iter().filter(|r| !r.has_ai_analysis()).count();
            format!(
                r#"<table>
<tr><th>Questions</th><td>{} ({} active)</td></tr>
<tr><th>Responses</th><td>{}</td></tr>
<tr><th>Awaiting AI analysis</th><td>{}</td></tr>
</table>"#,
                questions.len(),
                active,
                responses.len(),
                pending
            )
        }
        Err(e) => {
            tracing::warn!("Failed to load overview counts: {}", e);
            views::alert(Severity::Error, "Could not load the overview.")
        }
    };

    Ok(format!(
        r#"<div class="card">
<p>Signed in as {}.</p>
{stats}
<p><a class="btn" href="/admin/questions">Manage questions</a> <a class="btn outline" href="/admin/responses">View responses</a></p>
</div>"#,
        escape(identity.display_name())
    ))
}

fn items(heading: &str, items: &[AnalysisItem]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let rows: String = items
        .iter()
        .map(|item| {
            format!(
                "<li><strong>{}</strong><br>{}</li>",
                escape(&item.title),
                escape(&item.description)
            )
        })
        .collect();
    format!(r#"<div class="card"><h2>{}</h2><ul>{rows}</ul></div>"#, escape(heading))
}

async fn results(
    State(state): State<SharedState>,
    Authenticated(identity): Authenticated,
    Path(id): Path<ResponseId>,
) -> Result<Html<String>, PageError> {
    let analysis = state
        .api
        .get_analysis(Some(identity.credential.as_str()), id)
        .await?;

    let created = analysis
        .created_at
        .map(|at| format!("<p>Prepared {}</p>", state.display_zone.format_date(at)))
        .unwrap_or_default();
    let summary = analysis
        .summary
        .as_deref()
        .map(|s| format!(r#"<div class="card"><h2>Summary</h2><pre>{}</pre></div>"#, escape(s)))
        .unwrap_or_else(|| {
            views::alert(Severity::Info, "Your analysis is not ready yet. Check back later.")
        });

    let body = format!(
        "{created}{summary}{}{}",
        items("Insights", &analysis.insights),
        items("Recommendations", &analysis.recommendations)
    );
    Ok(views::page("Your results", Some(&identity), &body))
}
