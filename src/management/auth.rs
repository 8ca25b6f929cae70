use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::{
    error::{Error, Result},
    management::SessionStore,
    spotify::auth::TokenEndpoint,
    types::{Token, UserSession},
    utils,
};

/// Hands out valid access credentials, refreshing them transparently.
///
/// Refreshes for the same user are single-flight: while one request exchanges
/// the refresh credential, concurrent requests for that user wait and then
/// reuse the stored result instead of calling the provider again.
pub struct TokenManager {
    store: Arc<dyn SessionStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    buffer: Duration,
    in_flight: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        buffer: Duration,
    ) -> Self {
        TokenManager {
            store,
            endpoint,
            buffer,
            in_flight: StdMutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Returns an access credential that is valid for at least the safety buffer.
    ///
    /// No I/O beyond the store read happens while the stored credential is still
    /// outside the buffer.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` if the user never connected an account
    /// - `Error::SessionExpired` if the provider rejected the refresh credential
    /// - `Error::UpstreamUnavailable` on transient refresh failures
    pub async fn get_valid_token(&self, user_id: &str) -> Result<String> {
        Ok(self.get_valid_session(user_id).await?.access_token)
    }

    /// Like [`get_valid_token`](Self::get_valid_token) but returns the whole record.
    pub async fn get_valid_session(&self, user_id: &str) -> Result<UserSession> {
        let session = self.load_session(user_id).await?;
        if !self.needs_refresh(&session, Utc::now()) {
            return Ok(session);
        }

        let lock = self.user_lock(user_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.refresh_if_needed(user_id).await
        };
        self.release_lock(user_id, lock);
        result
    }

    /// Refreshes after the provider rejected `rejected_token`, unless the stored
    /// credential has already moved on, in which case that one is returned.
    pub async fn force_refresh(&self, user_id: &str, rejected_token: &str) -> Result<String> {
        let lock = self.user_lock(user_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.refresh_unless_replaced(user_id, rejected_token).await
        };
        self.release_lock(user_id, lock);
        result
    }

    /// Stores the first credential set of a freshly connected account.
    pub async fn connect(&self, user_id: &str, token: &Token) -> Result<UserSession> {
        utils::validate_user_id(user_id)?;
        let session = UserSession::from_token(user_id, token).ok_or_else(|| {
            Error::InvalidRequest("token carries no refresh credential".to_string())
        })?;

        self.store.save(&session).await?;
        tracing::info!(user_id, expires_at = %session.access_expires_at, "provider account connected");
        Ok(session)
    }

    /// Forgets the user's provider session. Returns whether one existed.
    pub async fn disconnect(&self, user_id: &str) -> Result<bool> {
        let removed = self.store.remove(user_id).await?;
        if removed {
            tracing::info!(user_id, "provider account disconnected");
        }
        Ok(removed)
    }

    /// Users with a refresh running or waiting right now.
    pub fn refreshing_users(&self) -> usize {
        self.in_flight.lock().map(|map| map.len()).unwrap_or_default()
    }

    pub fn needs_refresh(&self, session: &UserSession, now: DateTime<Utc>) -> bool {
        now >= session.access_expires_at - self.buffer
    }

    async fn load_session(&self, user_id: &str) -> Result<UserSession> {
        self.store
            .load(user_id)
            .await?
            .ok_or_else(|| Error::NotConnected(user_id.to_string()))
    }

    async fn refresh_if_needed(&self, user_id: &str) -> Result<UserSession> {
        // another request may have refreshed while we waited
        let session = self.load_session(user_id).await?;
        if !self.needs_refresh(&session, Utc::now()) {
            tracing::debug!(user_id, "credential refreshed by concurrent request");
            return Ok(session);
        }
        self.refresh(&session).await
    }

    async fn refresh_unless_replaced(&self, user_id: &str, rejected_token: &str) -> Result<String> {
        let session = self.load_session(user_id).await?;
        if session.access_token != rejected_token {
            tracing::debug!(user_id, "rejected credential already replaced");
            return Ok(session.access_token);
        }
        Ok(self.refresh(&session).await?.access_token)
    }

    async fn refresh(&self, session: &UserSession) -> Result<UserSession> {
        let user_id = session.user_id.as_str();
        tracing::info!(user_id, expires_at = %session.access_expires_at, "refreshing access credential");

        let token = match self.endpoint.refresh(&session.refresh_token).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "credential refresh failed");
                return Err(e);
            }
        };

        let updated = self
            .store
            .update_credentials(
                user_id,
                &token.access_token,
                token.refresh_token.as_deref(),
                token.expires_at(),
            )
            .await?;

        tracing::info!(
            user_id,
            expires_at = %updated.access_expires_at,
            rotated = token.refresh_token.is_some(),
            "access credential refreshed"
        );
        Ok(updated)
    }

    fn user_lock(&self, user_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| Error::Storage("refresh map poisoned".to_string()))?;
        Ok(Arc::clone(
            in_flight
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }

    /// Drops the user's entry once nobody else holds or waits on `lock`.
    fn release_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        // one reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            in_flight.remove(user_id);
        }
    }
}
