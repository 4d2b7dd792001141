use crate::domain::models::{Identity, Role};
use crate::state::SharedState;
use crate::web::views;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::convert::Infallible;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "session";
pub const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub session_id: Uuid,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(session_id: Uuid, role: Role, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
    let payload = format!("{}|{}|{}", session_id, role.as_str(), exp.timestamp());
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        general_purpose::URL_SAFE_NO_PAD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    if pieces.len() != 3 {
        return Err(SessionError::Invalid);
    }
    let session_id = Uuid::parse_str(pieces[0]).map_err(|_| SessionError::Invalid)?;
    let role = Role::try_from(pieces[1]).map_err(|_| SessionError::Role)?;
    let exp: i64 = pieces[2].parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims { session_id, role })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(COOKIE_NAME)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|token| token.to_string())
        })
        .filter(|token| !token.is_empty())
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{COOKIE_NAME}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{secure_flag}",
        SESSION_TTL_HOURS * 3600
    )
}

pub fn clear_cookie(secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{COOKIE_NAME}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{secure_flag}")
}

/// Session id named by a validly signed cookie, whatever the store says.
pub fn claimed_session(headers: &HeaderMap, key: &[u8]) -> Option<SessionClaims> {
    let token = extract_token(headers)?;
    verify_session(&token, key)
        .map_err(|e| {
            tracing::debug!("Ignoring session cookie: {}", e);
            e
        })
        .ok()
}

#[derive(Debug, Clone)]
pub enum SessionState {
    /// The store has not finished its initial hydration.
    Loading,
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// The visitor's session as seen by this request. Never rejects.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub session_id: Option<Uuid>,
    pub state: SessionState,
}

impl CurrentSession {
    pub fn identity(&self) -> Option<&Identity> {
        self.state.identity()
    }

    pub fn bearer(&self) -> Option<&str> {
        self.identity().map(|i| i.credential.as_str())
    }
}

pub async fn resolve_session(state: &SharedState, headers: &HeaderMap) -> CurrentSession {
    if state.sessions.is_loading() {
        return CurrentSession {
            session_id: None,
            state: SessionState::Loading,
        };
    }

    let Some(claims) = claimed_session(headers, &state.session_key) else {
        return CurrentSession {
            session_id: None,
            state: SessionState::Anonymous,
        };
    };

    let session_state = match state.sessions.get(claims.session_id).await {
        Some(identity) if identity.role == claims.role => SessionState::Authenticated(identity),
        Some(_) => {
            tracing::warn!("Session {} role does not match its cookie", claims.session_id);
            SessionState::Anonymous
        }
        None => SessionState::Anonymous,
    };

    CurrentSession {
        session_id: Some(claims.session_id),
        state: session_state,
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = SharedState::from_ref(state);
        Ok(resolve_session(&shared_state, &parts.headers).await)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    AnyIdentity,
    AdminOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Loading,
    RedirectToLogin,
    Redirect(&'static str),
    Render(Identity),
}

pub fn guard(session: &SessionState, access: Access) -> GuardDecision {
    match session {
        SessionState::Loading => GuardDecision::Loading,
        SessionState::Anonymous => GuardDecision::RedirectToLogin,
        SessionState::Authenticated(identity) => match access {
            Access::AdminOnly if !identity.is_admin() => {
                GuardDecision::Redirect(Role::Client.home_path())
            }
            _ => GuardDecision::Render(identity.clone()),
        },
    }
}

fn decision_into_result(decision: GuardDecision) -> Result<Identity, Response> {
    match decision {
        GuardDecision::Render(identity) => Ok(identity),
        GuardDecision::Loading => Err(views::loading_page()),
        GuardDecision::RedirectToLogin => Err(Redirect::to("/login").into_response()),
        GuardDecision::Redirect(path) => Err(Redirect::to(path).into_response()),
    }
}

/// Extractor for pages open to any logged-in identity.
pub struct Authenticated(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = SharedState::from_ref(state);
        let session = resolve_session(&shared_state, &parts.headers).await;
        decision_into_result(guard(&session.state, Access::AnyIdentity)).map(Authenticated)
    }
}

/// Extractor for admin-only pages.
pub struct AdminSession(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = SharedState::from_ref(state);
        let session = resolve_session(&shared_state, &parts.headers).await;
        decision_into_result(guard(&session.state, Access::AdminOnly)).map(AdminSession)
    }
}

/// Marker a page puts on its response when the backend refused the visitor's
/// credential.
#[derive(Debug, Clone, Copy)]
pub struct SessionRevoked;

/// Top-level session controller: when a handler signals [`SessionRevoked`],
/// forget the identity, expire the cookie and send the visitor to the login
/// page, whatever the handler meant to render.
pub async fn session_controller(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let claimed = claimed_session(request.headers(), &state.session_key);
    let response = next.run(request).await;

    if response.extensions().get::<SessionRevoked>().is_none() {
        return response;
    }

    if let Some(claims) = claimed {
        match state.sessions.remove(claims.session_id).await {
            Ok(true) => tracing::warn!("Session {} revoked by backend", claims.session_id),
            Ok(false) => {}
            Err(e) => tracing::error!("Failed to drop revoked session: {}", e),
        }
    }

    let mut redirect = Redirect::to("/login").into_response();
    if let Ok(value) = HeaderValue::from_str(&clear_cookie(state.secure_cookies)) {
        redirect.headers_mut().insert(header::SET_COOKIE, value);
    }
    redirect
}
