use crate::domain::validation;
use crate::state::SharedState;
use crate::web::error::PageError;
use crate::web::session::{self, CurrentSession, SessionState};
use crate::web::views::{self, escape, Severity};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginMode {
    Admin,
    Client,
}

impl LoginMode {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("client") => LoginMode::Client,
            _ => LoginMode::Admin,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            LoginMode::Admin => "admin",
            LoginMode::Client => "client",
        }
    }
}

#[derive(Deserialize, Default)]
pub struct LoginQuery {
    mode: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LoginForm {
    #[serde(default)]
    mode: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    email: String,
    marketing_consent: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        .with_state(state)
}

async fn login_page(session: CurrentSession, Query(query): Query<LoginQuery>) -> Response {
    match &session.state {
        SessionState::Loading => views::loading_page(),
        SessionState::Authenticated(identity) => {
            Redirect::to(identity.role.home_path()).into_response()
        }
        SessionState::Anonymous => {
            let mode = LoginMode::parse(query.mode.as_deref());
            render_login(mode, None, &LoginForm::default())
        }
    }
}

async fn login(
    State(state): State<SharedState>,
    session: CurrentSession,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    if state.sessions.is_loading() {
        return Ok(views::loading_page());
    }

    let mode = LoginMode::parse(Some(form.mode.as_str()));
    let attempt = match mode {
        LoginMode::Admin => {
            let Some(username) = validation::required(&form.username) else {
                return Ok(render_login(mode, Some("Username is required"), &form));
            };
            if form.password.is_empty() {
                return Ok(render_login(mode, Some("Password is required"), &form));
            }
            state.api.login(username, &form.password).await
        }
        LoginMode::Client => {
            let Some(email) = validation::required(&form.email) else {
                return Ok(render_login(mode, Some("Email is required"), &form));
            };
            if !validation::is_valid_email(email) {
                return Ok(render_login(mode, Some("Invalid email address"), &form));
            }
            state
                .api
                .client_login(
                    &validation::normalize_email(email),
                    form.marketing_consent.is_some(),
                )
                .await
        }
    };

    // a 401 here is a wrong password, not a lost session
    let identity = match attempt {
        Ok(identity) => identity,
        Err(e) if e.is_unauthorized() => {
            tracing::warn!("Rejected {} login attempt", mode.as_str());
            return Ok(render_login(mode, Some("Authentication failed"), &form));
        }
        Err(e) => {
            tracing::warn!("Login call failed: {}", e);
            let message = e.user_message("Authentication failed");
            return Ok(render_login(mode, Some(&message), &form));
        }
    };

    if let Some(previous) = session.session_id {
        state.sessions.remove(previous).await?;
    }

    let role = identity.role;
    let session_id = state.sessions.create(identity).await?;
    let token = session::sign_session(session_id, role, &state.session_key)?;
    tracing::info!("Session {} opened for {}", session_id, role.as_str());

    Ok((
        [(
            header::SET_COOKIE,
            session::session_cookie(&token, state.secure_cookies),
        )],
        Redirect::to(role.home_path()),
    )
        .into_response())
}

async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    if let Some(claims) = session::claimed_session(&headers, &state.session_key) {
        if state.sessions.remove(claims.session_id).await? {
            tracing::info!("Session {} closed", claims.session_id);
        }
    }
    Ok((
        [(header::SET_COOKIE, session::clear_cookie(state.secure_cookies))],
        Redirect::to("/login"),
    )
        .into_response())
}

fn render_login(mode: LoginMode, error: Option<&str>, form: &LoginForm) -> Response {
    let tab = |target: LoginMode, label: &str| {
        let class = if target == mode { "btn" } else { "btn outline" };
        format!(
            r#"<a class="{class}" href="/login?mode={}">{label}</a>"#,
            target.as_str()
        )
    };

    let fields = match mode {
        LoginMode::Admin => format!(
            r#"<label for="username">Username</label>
<input type="text" id="username" name="username" value="{}" autofocus>
<label for="password">Password</label>
<input type="password" id="password" name="password">"#,
            escape(&form.username)
        ),
        LoginMode::Client => format!(
            r#"<label for="email">Email</label>
<input type="email" id="email" name="email" value="{}" autofocus>
<label class="choice"><input type="checkbox" name="marketing_consent" value="on"{}> I agree to receive news and offers by email</label>"#,
            escape(&form.email),
            if form.marketing_consent.is_some() { " checked" } else { "" }
        ),
    };

    let error = error
        .map(|message| views::alert(Severity::Error, message))
        .unwrap_or_default();

    let body = format!(
        r#"<div class="card">
<p>{} {}</p>
{error}
<form method="post" action="/login">
<input type="hidden" name="mode" value="{}">
{fields}
<div class="actions"><span></span><button class="btn" type="submit">{}</button></div>
</form>
</div>"#,
        tab(LoginMode::Admin, "Administrator"),
        tab(LoginMode::Client, "Client"),
        mode.as_str(),
        match mode {
            LoginMode::Admin => "Login",
            LoginMode::Client => "Start questionnaire",
        }
    );

    views::page("Login", None, &body).into_response()
}

#[cfg(test)]
mod tests {
    use crate::domain::models::Role;
    use crate::test_support::{body_text, form, get, TestPortal, ADMIN_PASSWORD};
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn test_admin_login_sets_cookie_and_redirects_home() {
        let portal = TestPortal::spawn().await;
        let response = portal
            .send(form(
                "/login",
                None,
                &format!("mode=admin&username=root&password={ADMIN_PASSWORD}"),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("session="));
        assert_eq!(portal.state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_wrong_password_shows_inline_error() {
        let portal = TestPortal::spawn().await;
        let response = portal
            .send(form("/login", None, "mode=admin&username=root&password=nope"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(response).await.contains("Authentication failed"));
        assert_eq!(portal.state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn test_client_login_validates_email_locally() {
        let portal = TestPortal::spawn().await;
        let response = portal
            .send(form("/login", None, "mode=client&email=not-an-email"))
            .await;
        assert!(body_text(response).await.contains("Invalid email address"));

        let response = portal
            .send(form(
                "/login",
                None,
                "mode=client&email=Kim%40Example.com&marketing_consent=on",
            ))
            .await;
        assert_eq!(response.headers()[header::LOCATION], "/questionnaire");
    }

    #[tokio::test]
    async fn test_login_page_redirects_known_identity() {
        let portal = TestPortal::spawn().await;
        let cookie = portal.login(Role::Client, "client-kim@example.com").await;
        let response = portal.send(get("/login", Some(&cookie))).await;
        assert_eq!(response.headers()[header::LOCATION], "/questionnaire");
    }

    #[tokio::test]
    async fn test_logout_forgets_identity() {
        let portal = TestPortal::spawn().await;
        let cookie = portal.login(Role::Admin, "admin-token").await;
        assert_eq!(portal.state.sessions.len().await, 1);

        let response = portal.send(form("/logout", Some(&cookie), "")).await;
        assert_eq!(response.headers()[header::LOCATION], "/login");
        assert!(response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
        assert_eq!(portal.state.sessions.len().await, 0);
    }
}
