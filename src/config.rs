use crate::time_utils::DisplayZone;
use base64::{engine::general_purpose, Engine as _};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{0} must be base64")]
    NotBase64(&'static str),
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub backend_url: String,
    pub backend_timeout: Duration,
    pub session_key: Vec<u8>,
    pub enc_key: Vec<u8>,
    pub session_store_path: Option<PathBuf>,
    pub display_zone: DisplayZone,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup so tests don't touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| {
            let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let backend_url = lookup("BACKEND_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());

        let backend_timeout = match lookup("BACKEND_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "BACKEND_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(15),
        };

        let session_key = decode_key(&lookup, "SESSION_KEY")?;
        let enc_key = decode_key(&lookup, "APP_ENC_KEY")?;
        if enc_key.len() != 32 {
            return Err(ConfigError::Invalid {
                key: "APP_ENC_KEY",
                value: format!("{} bytes", enc_key.len()),
            });
        }

        let session_store_path = lookup("SESSION_STORE_PATH")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let raw_zone = lookup("DISPLAY_TIMEZONE").unwrap_or_else(|| "UTC".to_string());
        let display_zone = DisplayZone::parse(&raw_zone).ok_or_else(|| ConfigError::Invalid {
            key: "DISPLAY_TIMEZONE",
            value: raw_zone.clone(),
        })?;

        let secure_cookies = ["PRODUCTION", "RAILWAY_ENVIRONMENT", "RENDER", "FLY_APP_NAME"]
            .iter()
            .any(|key| lookup(key).is_some());

        Ok(Self {
            bind_addr,
            backend_url,
            backend_timeout,
            session_key,
            enc_key,
            session_store_path,
            display_zone,
            secure_cookies,
        })
    }
}

fn decode_key<F>(lookup: &F, key: &'static str) -> Result<Vec<u8>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).ok_or(ConfigError::Missing(key))?;
    general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|_| ConfigError::NotBase64(key))
}
