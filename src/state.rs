use crate::api::ApiClient;
use crate::domain::wizard::QuestionnaireFlow;
use crate::services::session_store::SessionStore;
use crate::time_utils::DisplayZone;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub sessions: SessionStore,
    pub visits: Arc<RwLock<HashMap<Uuid, Visit>>>, // visit id -> questionnaire in progress
    pub session_key: Vec<u8>,
    pub secure_cookies: bool,
    pub display_zone: DisplayZone,
}

/// One run through the questionnaire, alive until completed or idle too long.
#[derive(Clone)]
pub struct Visit {
    pub flow: QuestionnaireFlow,
    pub expires_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        api: ApiClient,
        sessions: SessionStore,
        session_key: Vec<u8>,
        secure_cookies: bool,
        display_zone: DisplayZone,
    ) -> Self {
        Self {
            api,
            sessions,
            visits: Arc::new(RwLock::new(HashMap::new())),
            session_key,
            secure_cookies,
            display_zone,
        }
    }
}

