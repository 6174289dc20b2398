use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

/// This portal's view of the platform session behind one recovery flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Establishing,
    Ready,
    Invalid,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Absent => "absent",
            SessionState::Establishing => "establishing",
            SessionState::Ready => "ready",
            SessionState::Invalid => "invalid",
        }
    }
}

/// Shared cell holding the current [`SessionState`] of a flow.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct SessionView {
    state: Arc<RwLock<SessionState>>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Absent)),
        }
    }

    pub fn get(&self) -> SessionState {
        // A poisoned lock still holds a valid Copy value.
        match self.state.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, next: SessionState) {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard != next {
            tracing::debug!(from = guard.as_str(), to = next.as_str(), "Session state change");
        }
        *guard = next;
    }

    pub fn is_ready(&self) -> bool {
        self.get() == SessionState::Ready
    }
}

/// What the platform tells us about an established session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}
