//! State machine for release-based (simple / rolling) deploys

use serde::{Deserialize, Serialize};

/// Release lifecycle state as seen by one deploy invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    /// Nothing created yet
    NoRelease,

    /// Release checked out and installed, not yet activated
    Released,

    /// Active pointer names the release
    Active,

    /// Active pointer reverted to the previous release
    RolledBack,
}

/// Release lifecycle event
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// Release directory created and dependencies installed
    Create,

    /// Pointers rotated onto the release
    Activate,

    /// Deploy failed after activation
    Fail(String),

    /// Pointers reverted
    Rollback,
}

/// Tracks one deploy's progress through the release lifecycle
#[derive(Debug, Clone)]
pub struct ReleaseFsm {
    state: ReleaseState,
    error: Option<String>,
}

impl ReleaseFsm {
    /// Create a new FSM with no release
    pub fn new() -> Self {
        Self {
            state: ReleaseState::NoRelease,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> ReleaseState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ReleaseEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (ReleaseState::NoRelease, ReleaseEvent::Create) => ReleaseState::Released,

            (ReleaseState::Released, ReleaseEvent::Activate) => ReleaseState::Active,

            (ReleaseState::Active, ReleaseEvent::Fail(err)) => {
                self.error = Some(err.clone());
                ReleaseState::Active
            }
            (ReleaseState::Active, ReleaseEvent::Rollback) => ReleaseState::RolledBack,

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for ReleaseFsm {
    fn default() -> Self {
        Self::new()
    }
}
