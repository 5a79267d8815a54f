//! Per-user session context.
//!
//! A session carries the login state, the chosen department filter and the
//! last dataset that loaded successfully. A failed reload leaves that
//! dataset in place so stale figures stay visible next to the error.
//!
//! The login is a plain equality check against configured credentials. It
//! gates the dashboard, nothing more.
//!
//! Sessions idle for longer than the store's timeout are dropped; the
//! sweep runs on every login and lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::kpi::DepartmentFilter;
use crate::transform::pipeline::Dataset;

/// Idle time after which a session is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(8 * 60 * 60);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username.trim() && self.password == password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub authenticated: bool,
    pub department_filter: DepartmentFilter,
    pub last_dataset: Option<Arc<Dataset>>,
    pub last_seen: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            authenticated: false,
            department_filter: DepartmentFilter::All,
            last_dataset: None,
            last_seen: Instant::now(),
        }
    }

    fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= timeout
    }

    /// Returns whether the login succeeded.
    pub fn login(&mut self, credentials: &Credentials, username: &str, password: &str) -> bool {
        self.authenticated = credentials.matches(username, password);
        self.authenticated
    }

    /// Back to a fresh, logged-out state under the same id.
    pub fn logout(&mut self) {
        self.authenticated = false;
        self.department_filter = DepartmentFilter::All;
        self.last_dataset = None;
    }

    pub fn remember(&mut self, dataset: Arc<Dataset>) {
        self.last_dataset = Some(dataset);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-side session registry.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Authenticate and open a session. `None` on bad credentials.
    pub fn login(&self, credentials: &Credentials, username: &str, password: &str) -> Option<Uuid> {
        let mut session = Session::new();
        if !session.login(credentials, username, password) {
            return None;
        }
        let id = session.id;
        let mut sessions = self.sessions.lock().ok()?;
        evict(&mut sessions, session.last_seen, self.idle_timeout);
        sessions.insert(id, session);
        Some(id)
    }

    pub fn logout(&self, id: Uuid) -> bool {
        match self.sessions.lock() {
            Ok(mut sessions) => sessions.remove(&id).is_some(),
            Err(_) => false,
        }
    }

    /// Snapshot of an authenticated session. Refreshes its idle clock.
    pub fn get(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.lock().ok()?;
        let now = Instant::now();
        evict(&mut sessions, now, self.idle_timeout);
        let session = sessions.get_mut(&id).filter(|s| s.authenticated)?;
        session.last_seen = now;
        Some(session.clone())
    }

    /// Apply `f` to the session if it exists and is authenticated.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().ok()?;
        let session = sessions.get_mut(&id).filter(|s| s.authenticated)?;
        Some(f(session))
    }

    /// Drop sessions idle at `now`. Returns how many were dropped.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        match self.sessions.lock() {
            Ok(mut sessions) => evict(&mut sessions, now, self.idle_timeout),
            Err(_) => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict(sessions: &mut HashMap<Uuid, Session>, now: Instant, timeout: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| !s.is_idle(now, timeout));
    before - sessions.len()
}
