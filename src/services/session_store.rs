use crate::crypto::{Crypto, CryptoError};
use crate::domain::models::{Identity, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file format: {0}")]
    Format(#[from] serde_json::Error),
    #[error("credential sealing: {0}")]
    Crypto(#[from] CryptoError),
}

/// On-disk shape of one identity; the credential is sealed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: Uuid,
    pub role: Role,
    pub handle: String,
    pub full_name: Option<String>,
    pub marketing_consent: bool,
    pub sealed_credential: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn load(&self) -> Result<Vec<StoredSession>, StoreError>;
    async fn save(&self, records: &[StoredSession]) -> Result<(), StoreError>;
}

/// Keeps nothing across restarts.
pub struct MemoryBackend;

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn load(&self) -> Result<Vec<StoredSession>, StoreError> {
        Ok(Vec::new())
    }

    async fn save(&self, _records: &[StoredSession]) -> Result<(), StoreError> {
        Ok(())
    }
}

/// JSON file, replaced atomically on every change.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionBackend for FileBackend {
    async fn load(&self) -> Result<Vec<StoredSession>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &[StoredSession]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

struct Entry {
    identity: Identity,
    sealed_credential: String,
    created_at: DateTime<Utc>,
}

struct Inner {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    backend: Box<dyn SessionBackend>,
    crypto: Crypto,
    loading: AtomicBool,
    // serializes snapshot + save so an older snapshot never overwrites a newer one
    write_gate: Mutex<()>,
}

/// Identities of logged-in visitors, keyed by the id their cookie carries.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    pub fn new(backend: Box<dyn SessionBackend>, crypto: Crypto) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: RwLock::new(HashMap::new()),
                backend,
                crypto,
                loading: AtomicBool::new(true),
                write_gate: Mutex::new(()),
            }),
        }
    }

    /// True until the first [`hydrate`](Self::hydrate) finishes.
    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::Acquire)
    }

    /// Loads persisted identities. Records whose credential no longer opens
    /// are dropped. Loading ends even when the file can't be read.
    pub async fn hydrate(&self) -> Result<usize, StoreError> {
        let _gate = self.inner.write_gate.lock().await;
        let records = match self.inner.backend.load().await {
            Ok(records) => records,
            Err(e) => {
                self.inner.loading.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let total = records.len();
        let mut restored = 0usize;
        {
            let mut sessions = self.inner.sessions.write().await;
            for record in records {
                let credential = match self.inner.crypto.open(&record.sealed_credential) {
                    Ok(credential) => credential,
                    Err(e) => {
                        tracing::warn!("Discarding stored session {}: {}", record.id, e);
                        continue;
                    }
                };
                sessions.entry(record.id).or_insert(Entry {
                    identity: Identity {
                        role: record.role,
                        handle: record.handle,
                        full_name: record.full_name,
                        marketing_consent: record.marketing_consent,
                        credential,
                    },
                    sealed_credential: record.sealed_credential,
                    created_at: record.created_at,
                });
                restored += 1;
            }
        }

        self.inner.loading.store(false, Ordering::Release);
        tracing::info!("Session store hydrated with {} of {} identities", restored, total);
        Ok(restored)
    }

    pub async fn create(&self, identity: Identity) -> Result<Uuid, StoreError> {
        let sealed_credential = self.inner.crypto.seal(&identity.credential)?;
        let id = Uuid::new_v4();

        let _gate = self.inner.write_gate.lock().await;
        {
            let mut sessions = self.inner.sessions.write().await;
            sessions.insert(
                id,
                Entry {
                    identity,
                    sealed_credential,
                    created_at: Utc::now(),
                },
            );
        }
        self.persist().await?;
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<Identity> {
        let sessions = self.inner.sessions.read().await;
        sessions.get(&id).map(|entry| entry.identity.clone())
    }

    /// Returns whether an identity was stored under `id`.
    pub async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let _gate = self.inner.write_gate.lock().await;
        let removed = {
            let mut sessions = self.inner.sessions.write().await;
            sessions.remove(&id).is_some()
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Drops identities created before `cutoff`; their cookies have expired.
    pub async fn prune_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let _gate = self.inner.write_gate.lock().await;
        let pruned = {
            let mut sessions = self.inner.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, entry| entry.created_at >= cutoff);
            before - sessions.len()
        };
        if pruned > 0 {
            self.persist().await?;
        }
        Ok(pruned)
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    // caller holds write_gate
    async fn persist(&self) -> Result<(), StoreError> {
        let snapshot: Vec<StoredSession> = {
            let sessions = self.inner.sessions.read().await;
            sessions
                .iter()
                .map(|(id, entry)| StoredSession {
                    id: *id,
                    role: entry.identity.role,
                    handle: entry.identity.handle.clone(),
                    full_name: entry.identity.full_name.clone(),
                    marketing_consent: entry.identity.marketing_consent,
                    sealed_credential: entry.sealed_credential.clone(),
                    created_at: entry.created_at,
                })
                .collect()
        };
        self.inner.backend.save(&snapshot).await.map_err(|e| {
            tracing::error!("Failed to persist sessions: {}", e);
            e
        })
    }
}
