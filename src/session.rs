//! Signed-in session context
//!
//! Constructed once by the embedding application after its auth flow
//! completes and passed to [`crate::AppContext`]. Nothing in this crate
//! looks up the current user from global state.

use crate::error::AppError;

/// Current session
#[derive(Debug, Clone, Default)]
pub struct Session {
    actor_id: Option<String>,
    access_token: Option<String>,
}

impl Session {
    /// Session with no signed-in actor
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Session for a signed-in actor
    ///
    /// Blank actor ids are treated as anonymous.
    ///
    /// # Arguments
    /// * `actor_id` - Backend user id of the actor
    /// * `access_token` - User JWT forwarded to the REST backend, if any
    pub fn signed_in(actor_id: impl Into<String>, access_token: Option<String>) -> Self {
        let actor_id = actor_id.into();
        let actor_id = actor_id.trim();
        Self {
            actor_id: (!actor_id.is_empty()).then(|| actor_id.to_string()),
            access_token: access_token.filter(|token| !token.trim().is_empty()),
        }
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Actor id, or `NotAuthenticated` when nobody is signed in.
    pub fn require_actor(&self) -> Result<&str, AppError> {
        self.actor_id().ok_or(AppError::NotAuthenticated)
    }
}
