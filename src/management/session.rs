use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex as StdMutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::{Error, Result},
    types::UserSession,
    utils,
};

/// Persistence collaborator holding one provider session per user.
///
/// Every mutation is atomic per user: a concurrent reader observes either the
/// old or the new record, never a mix of both.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<UserSession>>;

    /// Inserts or replaces the whole record.
    async fn save(&self, session: &UserSession) -> Result<()>;

    /// Writes a refreshed credential set. `refresh_token` is only replaced when `Some`.
    async fn update_credentials(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        access_expires_at: DateTime<Utc>,
    ) -> Result<UserSession>;

    async fn set_active_device(&self, user_id: &str, device_id: Option<&str>) -> Result<()>;

    async fn remove(&self, user_id: &str) -> Result<bool>;

    async fn list(&self) -> Result<Vec<UserSession>>;
}

fn apply_credentials(
    session: &mut UserSession,
    access_token: &str,
    refresh_token: Option<&str>,
    access_expires_at: DateTime<Utc>,
) {
    session.access_token = access_token.to_string();
    if let Some(refresh) = refresh_token {
        session.refresh_token = refresh.to_string();
    }
    session.access_expires_at = access_expires_at;
}

/// Sessions as JSON files, one per user, under `<data_dir>/sessions`.
pub struct FileSessionStore {
    dir: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("sessions"),
            write_lock: Mutex::new(()),
        }
    }

    fn session_path(&self, user_id: &str) -> Result<PathBuf> {
        utils::validate_user_id(user_id)?;
        Ok(self.dir.join(format!("{}.json", user_id)))
    }

    async fn read(&self, path: &Path) -> Result<Option<UserSession>> {
        match async_fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, session: &UserSession) -> Result<()> {
        let path = self.session_path(&session.user_id)?;
        async_fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_string_pretty(session)?;
        // write-then-rename so readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        async_fs::write(&tmp, json).await?;
        async_fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserSession>> {
        let path = self.session_path(user_id)?;
        self.read(&path).await
    }

    async fn save(&self, session: &UserSession) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(session).await
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        access_expires_at: DateTime<Utc>,
    ) -> Result<UserSession> {
        let _guard = self.write_lock.lock().await;
        let path = self.session_path(user_id)?;
        let mut session = self
            .read(&path)
            .await?
            .ok_or_else(|| Error::NotConnected(user_id.to_string()))?;

        apply_credentials(&mut session, access_token, refresh_token, access_expires_at);
        self.write(&session).await?;
        Ok(session)
    }

    async fn set_active_device(&self, user_id: &str, device_id: Option<&str>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.session_path(user_id)?;
        let mut session = self
            .read(&path)
            .await?
            .ok_or_else(|| Error::NotConnected(user_id.to_string()))?;

        session.active_device_id = device_id.map(str::to_string);
        self.write(&session).await
    }

    async fn remove(&self, user_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let path = self.session_path(user_id)?;
        match async_fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<UserSession>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(session) = self.read(&path).await? {
                    sessions.push(session);
                }
            }
        }
        sessions.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(sessions)
    }
}

/// In-process store, used by tests and by single-process deployments.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: StdMutex<HashMap<String, UserSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: impl IntoIterator<Item = UserSession>) -> Self {
        let map = sessions
            .into_iter()
            .map(|s| (s.user_id.clone(), s))
            .collect();
        Self {
            sessions: StdMutex::new(map),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, UserSession>>> {
        self.sessions
            .lock()
            .map_err(|_| Error::Storage("session map poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserSession>> {
        Ok(self.lock()?.get(user_id).cloned())
    }

    async fn save(&self, session: &UserSession) -> Result<()> {
        self.lock()?
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        access_expires_at: DateTime<Utc>,
    ) -> Result<UserSession> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(user_id)
            .ok_or_else(|| Error::NotConnected(user_id.to_string()))?;
        apply_credentials(session, access_token, refresh_token, access_expires_at);
        Ok(session.clone())
    }

    async fn set_active_device(&self, user_id: &str, device_id: Option<&str>) -> Result<()> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(user_id)
            .ok_or_else(|| Error::NotConnected(user_id.to_string()))?;
        session.active_device_id = device_id.map(str::to_string);
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(user_id).is_some())
    }

    async fn list(&self) -> Result<Vec<UserSession>> {
        let mut sessions: Vec<UserSession> = self.lock()?.values().cloned().collect();
        sessions.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(sessions)
    }
}
