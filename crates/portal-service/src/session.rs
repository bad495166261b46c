//! Login sessions
//!
//! Sessions exist only in memory. Each interaction starts with
//! [`SessionManager::touch`], which compares idle time against the
//! configured timeout; an expired session is dropped and the caller has to
//! log in again.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use portal_core::{AuthError, PortalId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An authenticated portal session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: SessionId,
    /// Portal the session logged into
    pub portal: PortalId,
    /// Member name picked after login
    pub member: Option<String>,
    /// Login time
    pub opened_at: DateTime<Utc>,
    /// Last interaction
    pub last_seen: DateTime<Utc>,
}

impl Session {
    /// Check if the session belongs to the admin portal
    #[inline]
    #[must_use]
    pub fn is_admin(&self, admin: &PortalId) -> bool {
        self.portal == *admin
    }

    /// Selected member
    ///
    /// # Errors
    /// `AuthError::NoMemberSelected` before a member is picked
    pub fn member(&self) -> Result<&str, AuthError> {
        self.member.as_deref().ok_or(AuthError::NoMemberSelected)
    }
}

/// In-memory session table
#[derive(Debug)]
pub struct SessionManager {
    timeout: Duration,
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl SessionManager {
    /// Create manager with an idle timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Idle timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open a session for an authenticated portal
    pub fn open(&self, portal: PortalId, now: DateTime<Utc>) -> Session {
        let session = Session {
            id: SessionId::new(),
            portal,
            member: None,
            opened_at: now,
            last_seen: now,
        };
        self.sessions.lock().insert(session.id, session.clone());
        session
    }

    /// Start an interaction: check expiry, then refresh `last_seen`
    ///
    /// # Errors
    /// `AuthError::UnknownSession` or `AuthError::SessionExpired`
    pub fn touch(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let mut sessions = self.sessions.lock();
        let unknown = || AuthError::UnknownSession(id.to_string());

        let last_seen = sessions.get(id).map(|s| s.last_seen).ok_or_else(unknown)?;
        let idle = now - last_seen;
        if idle > self.timeout {
            sessions.remove(id);
            tracing::info!("session {} expired after {}s idle", id, idle.num_seconds());
            return Err(AuthError::SessionExpired {
                session: id.to_string(),
                idle_secs: idle.num_seconds(),
            });
        }

        let session = sessions.get_mut(id).ok_or_else(unknown)?;
        if now > session.last_seen {
            session.last_seen = now;
        }
        Ok(session.clone())
    }

    /// Record which member is using the session
    ///
    /// # Errors
    /// As [`SessionManager::touch`]
    pub fn select_member(
        &self,
        id: &SessionId,
        member: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        self.touch(id, now)?;
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AuthError::UnknownSession(id.to_string()))?;
        session.member = Some(member.trim().to_string());
        Ok(session.clone())
    }

    /// End a session; returns false if it was not open
    pub fn close(&self, id: &SessionId) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    /// End every session of a portal (after deletion or password change)
    pub fn close_portal(&self, portal: &PortalId) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.portal != *portal);
        before - sessions.len()
    }

    /// Drop sessions idle past the timeout
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| now - s.last_seen <= self.timeout);
        before - sessions.len()
    }

    /// Number of open sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Check if no sessions are open
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
