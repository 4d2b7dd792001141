mod api;
mod config;
mod crypto;
mod domain;
mod services;
mod state;
#[cfg(test)]
mod test_support;
mod time_utils;
mod web;

use crate::config::Config;
use crate::services::session_store::{FileBackend, MemoryBackend, SessionBackend, SessionStore};
use crate::state::{AppState, SharedState};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let crypto = crypto::Crypto::from_key_bytes(&config.enc_key)?;

    let backend: Box<dyn SessionBackend> = match &config.session_store_path {
        Some(path) => {
            tracing::info!("Persisting sessions to {}", path.display());
            Box::new(FileBackend::new(path.clone()))
        }
        None => {
            tracing::warn!("SESSION_STORE_PATH not set; sessions are lost on restart");
            Box::new(MemoryBackend)
        }
    };
    let sessions = SessionStore::new(backend, crypto);

    // pages answer "Loading" until this finishes
    let hydrating = sessions.clone();
    tokio::spawn(async move {
        if let Err(e) = hydrating.hydrate().await {
            tracing::error!("Failed to restore sessions: {}", e);
        }
    });

    let api = api::ApiClient::new(&config.backend_url, config.backend_timeout)?;
    tracing::info!("Backend API at {}", config.backend_url);

    let shared: SharedState = Arc::new(AppState::new(
        api,
        sessions,
        config.session_key.clone(),
        config.secure_cookies,
        config.display_zone,
    ));

    let scheduler = JobScheduler::new().await?;

    // Hourly cleanup of idle questionnaire visits and expired identities
    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                let visits = web::questionnaire::sweep_expired_visits(&state).await;
                if visits > 0 {
                    tracing::info!("Cleaned up {} idle questionnaire visits", visits);
                }

                let cutoff =
                    chrono::Utc::now() - chrono::Duration::hours(web::session::SESSION_TTL_HOURS);
                match state.sessions.prune_created_before(cutoff).await {
                    Ok(0) => tracing::debug!("No expired sessions to prune"),
                    Ok(pruned) => {
                        let remaining = state.sessions.len().await;
                        tracing::info!("Pruned {} expired sessions, {} remain", pruned, remaining);
                    }
                    Err(e) => tracing::error!("Failed to prune sessions: {}", e),
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started: hourly visit and session cleanup");

    let app = web::app(shared);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
