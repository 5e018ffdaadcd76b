use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::Session;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid PIN")]
    InvalidPin,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    last_seen: DateTime<Utc>,
}

/// Single shared-PIN authentication over a server-side session store.
///
/// With an empty PIN the gate is disabled: every session counts as
/// authenticated and nothing is stored or issued. Otherwise the store holds
/// only sessions that logged in, so clients that never do (scripts, pollers
/// without a cookie jar) cost nothing. The PIN is compared in plaintext,
/// with no lockout; this is meant for a trusted home network only.
pub struct SessionGate {
    pin: String,
    idle_timeout: Option<Duration>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionGate {
    pub fn new(pin: impl Into<String>, idle_timeout: Option<Duration>) -> Self {
        Self {
            pin: pin.into(),
            idle_timeout,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a PIN is configured at all
    pub fn is_enabled(&self) -> bool {
        !self.pin.is_empty()
    }

    fn is_idle(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| now - record.last_seen > timeout)
    }

    /// Find the session for a cookie token and mark it active.
    ///
    /// A request without a token gets a fresh, unstored one. A token with no
    /// live record (never logged in, logged out, idle past the timeout or
    /// from before a restart) is unauthenticated. The second value is true
    /// when a new token must be handed out.
    pub fn resume(&self, token: Option<&str>) -> (Session, bool) {
        if !self.is_enabled() {
            return (
                Session {
                    token: String::new(),
                    authenticated: true,
                },
                false,
            );
        }

        let Some(token) = token else {
            return (Session::new(uuid::Uuid::new_v4().simple().to_string()), true);
        };

        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let expired = sessions
            .get(token)
            .is_some_and(|record| self.is_idle(record, now));
        if expired {
            sessions.remove(token);
            tracing::debug!("Session expired after idle timeout");
        }

        let authenticated = match sessions.get_mut(token) {
            Some(record) => {
                record.last_seen = now;
                true
            }
            None => false,
        };

        (
            Session {
                token: token.to_string(),
                authenticated,
            },
            false,
        )
    }

    /// True when no PIN is configured, otherwise whether this session has a
    /// live login.
    pub fn is_authenticated(&self, session: &Session) -> bool {
        if !self.is_enabled() {
            return true;
        }

        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.contains_key(&session.token)
    }

    /// Check the supplied PIN and, on an exact match, record the session as
    /// logged in.
    pub fn login(&self, session: &Session, supplied_pin: &str) -> Result<Session, AuthError> {
        if !self.is_enabled() {
            return Ok(Session {
                token: session.token.clone(),
                authenticated: true,
            });
        }

        if supplied_pin != self.pin {
            return Err(AuthError::InvalidPin);
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(
            session.token.clone(),
            SessionRecord {
                last_seen: Utc::now(),
            },
        );

        Ok(Session {
            token: session.token.clone(),
            authenticated: true,
        })
    }

    /// Forget the login; the token stays usable as an anonymous session.
    pub fn logout(&self, session: &Session) -> Session {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(&session.token);

        Session {
            token: session.token.clone(),
            authenticated: false,
        }
    }

    /// Drop sessions idle past the timeout
    pub fn purge_idle(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, record| !self.is_idle(record, now));
        before - sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
