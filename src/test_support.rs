//! In-process stand-in for the questionnaire backend, served on an ephemeral
//! port so the real reqwest client is exercised end to end, plus a portal
//! wired to it for page tests.

use crate::api::ApiClient;
use crate::crypto::Crypto;
use crate::domain::models::{
    AnsweredQuestion, Answer, Identity, Question, QuestionDraft, QuestionKind, Response,
    ResponseSubmission, Role, Score,
};
use crate::services::session_store::{MemoryBackend, SessionStore};
use crate::state::{AppState, SharedState};
use crate::time_utils::DisplayZone;
use crate::web::session::sign_session;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::{get as get_route, patch, post, put},
    Json, Router,
};
use tower::ServiceExt;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const ADMIN_PASSWORD: &str = "secret";
pub const SUBMITTED_EMAIL: &str = "taken@example.com";

pub struct FakeData {
    pub questions: Vec<Question>,
    pub responses: Vec<Response>,
    next_question_id: i64,
    next_response_id: i64,
    /// Every credential is refused with 401.
    pub revoked: bool,
    /// The duplicate-email check answers 500.
    pub check_down: bool,
    /// Submissions answer 500.
    pub submit_down: bool,
    /// Submissions are held this long before being stored.
    pub submit_delay: Option<Duration>,
    /// The full question list answers 500; mutations still work.
    pub list_down: bool,
    /// Single-response reads and analysis writes answer 500.
    pub responses_down: bool,
}

impl FakeData {
    fn seeded() -> Self {
        let questions = vec![
            Question {
                id: 1,
                order_number: 2,
                text: "How would you rate your sleep quality?".to_string(),
                active: true,
                kind: QuestionKind::Rating,
                options: Vec::new(),
            },
            Question {
                id: 2,
                order_number: 1,
                text: "How often do you exercise?".to_string(),
                active: true,
                kind: QuestionKind::MultipleChoice,
                options: ["Never", "Rarely", "Sometimes", "Often", "Always"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            Question {
                id: 3,
                order_number: 3,
                text: "Retired question".to_string(),
                active: false,
                kind: QuestionKind::Rating,
                options: Vec::new(),
            },
        ];

        let mut data = Self {
            questions,
            responses: Vec::new(),
            next_question_id: 4,
            next_response_id: 1,
            revoked: false,
            check_down: false,
            submit_down: false,
            submit_delay: None,
            list_down: false,
            responses_down: false,
        };
        let seed = ResponseSubmission {
            email: SUBMITTED_EMAIL.to_string(),
            full_name: Some("Taylor Reed".to_string()),
            marketing_consent: true,
            answers: vec![
                crate::domain::models::SubmittedAnswer {
                    question_id: 1,
                    score: Score::new(3).expect("valid score"),
                },
                crate::domain::models::SubmittedAnswer {
                    question_id: 2,
                    score: Score::new(5).expect("valid score"),
                },
            ],
        };
        data.store_response(&seed);
        data
    }

    fn store_response(&mut self, submission: &ResponseSubmission) -> i64 {
        let id = self.next_response_id;
        self.next_response_id += 1;
        let answers = submission
            .answers
            .iter()
            .map(|a| {
                let q = self.questions.iter().find(|q| q.id == a.question_id);
                Answer {
                    question: Some(AnsweredQuestion {
                        id: a.question_id,
                        question_text: q.map(|q| q.text.clone()),
                        order_number: q.map(|q| q.order_number),
                    }),
                    question_id: Some(a.question_id),
                    score: a.score,
                }
            })
            .collect();
        self.responses.push(Response {
            id,
            user_email: submission.email.clone(),
            full_name: submission.full_name.clone(),
            marketing_consent: submission.marketing_consent,
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            answers,
            ai_analysis: None,
            final_analysis: None,
        });
        id
    }
}

type Shared = Arc<Mutex<FakeData>>;

pub struct FakeBackend {
    pub data: Shared,
    pub base_url: String,
}

impl FakeBackend {
    pub async fn spawn() -> Self {
        let data: Shared = Arc::new(Mutex::new(FakeData::seeded()));
        let app = router(data.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            data,
            base_url: format!("http://{}", addr),
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(5)).unwrap()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeData) -> R) -> R {
        let mut data = self.data.lock().unwrap();
        f(&mut data)
    }
}

fn router(data: Shared) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/client-login", post(client_login))
        .route("/api/questions", post(create_question))
        .route("/api/questions/active", get_route(active_questions))
        .route("/api/questions/all", get_route(all_questions))
        .route("/api/questions/:id", put(update_question).delete(delete_question))
        .route("/api/questions/:id/toggle", patch(toggle_question))
        .route("/api/responses", post(submit).get(list_responses))
        .route("/api/responses/check/:email", get_route(check_email))
        .route("/api/responses/:id", get_route(get_response))
        .route("/api/responses/:id/generate-analysis", post(generate_analysis))
        .route("/api/responses/:id/final-analysis", put(final_analysis))
        .route("/api/analysis/:id", get_route(analysis))
        .with_state(data)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

fn unauthorized() -> axum::response::Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

/// `Ok` for a valid admin token.
fn require_admin(data: &FakeData, headers: &HeaderMap) -> Result<(), axum::response::Response> {
    match bearer(headers) {
        Some(token) if token == ADMIN_TOKEN && !data.revoked => Ok(()),
        _ => Err(unauthorized()),
    }
}

/// Anonymous calls pass; a presented credential must still be valid.
fn allow_optional(data: &FakeData, headers: &HeaderMap) -> Result<(), axum::response::Response> {
    match bearer(headers) {
        None => Ok(()),
        Some(token)
            if !data.revoked && (token == ADMIN_TOKEN || token.starts_with("client-")) =>
        {
            Ok(())
        }
        Some(_) => Err(unauthorized()),
    }
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(Json(body): Json<LoginBody>) -> axum::response::Response {
    if body.password != ADMIN_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response();
    }
    Json(json!({ "token": ADMIN_TOKEN, "username": body.username })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientLoginBody {
    email: String,
    marketing_consent: bool,
}

async fn client_login(Json(body): Json<ClientLoginBody>) -> axum::response::Response {
    Json(json!({
        "token": format!("client-{}", body.email),
        "email": body.email,
        "marketingConsent": body.marketing_consent
    }))
    .into_response()
}

async fn active_questions(State(data): State<Shared>, headers: HeaderMap) -> axum::response::Response {
    let data = data.lock().unwrap();
    if let Err(resp) = allow_optional(&data, &headers) {
        return resp;
    }
    let active: Vec<Question> = data.questions.iter().filter(|q| q.active).cloned().collect();
    Json(active).into_response()
}

async fn all_questions(State(data): State<Shared>, headers: HeaderMap) -> axum::response::Response {
    let data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    if data.list_down {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(data.questions.clone()).into_response()
}

fn apply_draft(q: &mut Question, draft: QuestionDraft) {
    q.text = draft.question_text;
    q.order_number = draft.order_number;
    q.active = draft.active;
    q.kind = draft.question_type;
    q.options = draft.options;
}

async fn create_question(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(draft): Json<QuestionDraft>,
) -> axum::response::Response {
    let mut data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    if data.questions.iter().any(|q| q.order_number == draft.order_number) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "Order number already in use" })),
        )
            .into_response();
    }
    let mut q = Question {
        id: data.next_question_id,
        order_number: 0,
        text: String::new(),
        active: true,
        kind: QuestionKind::Rating,
        options: Vec::new(),
    };
    data.next_question_id += 1;
    apply_draft(&mut q, draft);
    data.questions.push(q.clone());
    (StatusCode::CREATED, Json(q)).into_response()
}

async fn update_question(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(draft): Json<QuestionDraft>,
) -> axum::response::Response {
    let mut data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    match data.questions.iter_mut().find(|q| q.id == id) {
        Some(q) => {
            apply_draft(q, draft);
            Json(q.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn toggle_question(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> axum::response::Response {
    let mut data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    match data.questions.iter_mut().find(|q| q.id == id) {
        Some(q) => {
            q.active = !q.active;
            Json(q.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_question(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> axum::response::Response {
    let mut data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    let before = data.questions.len();
    data.questions.retain(|q| q.id != id);
    if data.questions.len() == before {
        return StatusCode::NOT_FOUND.into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn submit(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(submission): Json<ResponseSubmission>,
) -> axum::response::Response {
    let delay = data.lock().unwrap().submit_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let mut data = data.lock().unwrap();
    if let Err(resp) = allow_optional(&data, &headers) {
        return resp;
    }
    if data.submit_down {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable").into_response();
    }
    let id = data.store_response(&submission);
    (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
}

async fn list_responses(State(data): State<Shared>, headers: HeaderMap) -> axum::response::Response {
    let data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    Json(data.responses.clone()).into_response()
}

async fn check_email(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> axum::response::Response {
    let data = data.lock().unwrap();
    if let Err(resp) = allow_optional(&data, &headers) {
        return resp;
    }
    if data.check_down {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let taken = data
        .responses
        .iter()
        .any(|r| r.user_email.eq_ignore_ascii_case(&email));
    Json(json!({ "hasSubmitted": taken })).into_response()
}

async fn get_response(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> axum::response::Response {
    let data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    if data.responses_down {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match data.responses.iter().find(|r| r.id == id) {
        Some(r) => Json(r.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Response not found" })))
            .into_response(),
    }
}

async fn generate_analysis(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> axum::response::Response {
    let mut data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    if data.responses_down {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match data.responses.iter_mut().find(|r| r.id == id) {
        Some(r) => {
            r.ai_analysis = Some(format!("Generated analysis for {}", r.user_email));
            Json(r.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn final_analysis(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    body: String,
) -> axum::response::Response {
    let mut data = data.lock().unwrap();
    if let Err(resp) = require_admin(&data, &headers) {
        return resp;
    }
    if data.responses_down {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let plain = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/plain"))
        .unwrap_or(false);
    if !plain {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }
    match data.responses.iter_mut().find(|r| r.id == id) {
        Some(r) => {
            r.final_analysis = Some(body);
            Json(r.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn analysis(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> axum::response::Response {
    let data = data.lock().unwrap();
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    if let Err(resp) = allow_optional(&data, &headers) {
        return resp;
    }
    if !data.responses.iter().any(|r| r.id == id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({
        "createdAt": "2024-05-02T08:00:00Z",
        "summary": "Solid habits overall.",
        "insights": [{ "title": "Sleep", "description": "Sleep quality is average." }],
        "recommendations": [{ "title": "Move daily", "description": "Add a short walk." }]
    }))
    .into_response()
}

pub const SESSION_KEY: &[u8] = b"portal-test-session-key";
pub const CLIENT_EMAIL: &str = "kim@example.com";

/// The portal router in front of a [`FakeBackend`].
pub struct TestPortal {
    pub backend: FakeBackend,
    pub state: SharedState,
    app: Router,
}

impl TestPortal {
    pub async fn spawn() -> Self {
        let portal = Self::spawn_unhydrated().await;
        portal.state.sessions.hydrate().await.unwrap();
        portal
    }

    /// Session store still loading, as right after startup.
    pub async fn spawn_unhydrated() -> Self {
        let backend = FakeBackend::spawn().await;
        let crypto = Crypto::from_key_bytes(&[7u8; 32]).unwrap();
        let sessions = SessionStore::new(Box::new(MemoryBackend), crypto);
        let state: SharedState = Arc::new(AppState::new(
            backend.client(),
            sessions,
            SESSION_KEY.to_vec(),
            false,
            DisplayZone::default(),
        ));
        let app = crate::web::app(state.clone());
        Self {
            backend,
            state,
            app,
        }
    }

    /// Stores an identity directly and returns the matching `Cookie` header.
    pub async fn login(&self, role: Role, credential: &str) -> String {
        let identity = match role {
            Role::Admin => Identity {
                role,
                handle: "admin".to_string(),
                full_name: None,
                marketing_consent: false,
                credential: credential.to_string(),
            },
            Role::Client => Identity {
                role,
                handle: CLIENT_EMAIL.to_string(),
                full_name: Some("Kim Lee".to_string()),
                marketing_consent: true,
                credential: credential.to_string(),
            },
        };
        let id = self.state.sessions.create(identity).await.unwrap();
        let token = sign_session(id, role, SESSION_KEY).unwrap();
        format!("session={token}")
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
