//! In-memory session store.
//!
//! Maps token digests to sessions. Sessions are ephemeral and lost on
//! restart. Revoked sessions are removed at once; expired ones are swept
//! whenever a new session is issued.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

use super::crypto::{TokenHasher, generate_token};
use crate::user::UserId;

/// Opaque session token handed to the caller. Only its digest is stored.
pub type SessionToken = String;

/// A live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl Session {
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// Token lookup table.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone, Debug)]
pub struct SessionStore {
    hasher: Arc<TokenHasher>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub(crate) fn new(hasher: TokenHasher) -> Self {
        Self {
            hasher: Arc::new(hasher),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Issue a token for `user_id` valid for `ttl` from `now`.
    pub async fn create_session(&self, user_id: &str, now: u64, ttl: Duration) -> SessionToken {
        let token = generate_token();
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let session = Session {
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at: now.saturating_add(ttl_millis),
        };
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.is_valid_at(now));
        sessions.insert(self.hasher.digest(&token), session);
        token
    }

    /// Owner of a valid token. An expired entry is removed.
    pub async fn lookup(&self, token: &str, now: u64) -> Option<UserId> {
        let key = self.hasher.digest(token);
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&key) {
                None => return None,
                Some(session) if session.is_valid_at(now) => {
                    return Some(session.user_id.clone());
                }
                Some(_) => {}
            }
        }
        let mut sessions = self.sessions.write().await;
        if sessions.get(&key).is_some_and(|s| !s.is_valid_at(now)) {
            sessions.remove(&key);
        }
        None
    }

    /// Revoke a token, returning its owner if it was known.
    /// Unknown or already revoked tokens are a no-op.
    pub async fn revoke(&self, token: &str) -> Option<UserId> {
        let key = self.hasher.digest(token);
        let mut sessions = self.sessions.write().await;
        sessions.remove(&key).map(|session| session.user_id)
    }

    /// Revoke every session of `user_id` except the one holding `keep`.
    /// Returns how many were revoked.
    pub async fn revoke_user(&self, user_id: &str, keep: Option<&str>) -> usize {
        let keep = keep.map(|token| self.hasher.digest(token));
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|key, session| {
            session.user_id != user_id || keep.as_deref() == Some(key.as_str())
        });
        before - sessions.len()
    }

    /// Number of sessions still valid at `now`.
    pub async fn active_count(&self, now: u64) -> usize {
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| s.is_valid_at(now)).count()
    }

    /// Number of entries in the lookup table, live or not yet swept.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every expired session. Returns how many were removed.
    pub async fn prune(&self, now: u64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_valid_at(now));
        before - sessions.len()
    }
}
