//! Authentication state consumed by sync.
//!
//! Cadence does not sign users in itself. Whatever front end owns the login
//! flow publishes the current identity through an [`AuthHandle`]; the sync
//! engine watches it to start syncing when a user appears and to clear
//! local data when they sign out.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl fmt::Display for AuthUser {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(formatter, "{} <{}>", self.id, email),
            None => formatter.write_str(&self.id),
        }
    }
}

/// Snapshot of the auth collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub current_user: Option<AuthUser>,
    /// Identity not known yet (e.g. a session is being restored)
    pub is_loading: bool,
}

impl AuthState {
    pub const fn loading() -> Self {
        Self {
            current_user: None,
            is_loading: true,
        }
    }

    pub const fn signed_out() -> Self {
        Self {
            current_user: None,
            is_loading: false,
        }
    }

    pub const fn signed_in(user: AuthUser) -> Self {
        Self {
            current_user: Some(user),
            is_loading: false,
        }
    }

    /// The signed-in user once loading has finished
    pub fn ready_user(&self) -> Option<&AuthUser> {
        if self.is_loading {
            None
        } else {
            self.current_user.as_ref()
        }
    }
}

/// Shared, observable auth state
#[derive(Clone)]
pub struct AuthHandle {
    sender: Arc<watch::Sender<AuthState>>,
}

impl AuthHandle {
    pub fn new(initial: AuthState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn state(&self) -> AuthState {
        self.sender.borrow().clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.sender.borrow().ready_user().cloned()
    }

    pub fn user_id(&self) -> Option<String> {
        self.sender.borrow().ready_user().map(|user| user.id.clone())
    }

    pub fn sign_in(&self, user: AuthUser) {
        tracing::debug!("Auth: signed in as {}", user.id);
        self.sender.send_replace(AuthState::signed_in(user));
    }

    pub fn sign_out(&self) {
        tracing::debug!("Auth: signed out");
        self.sender.send_replace(AuthState::signed_out());
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.sender.send_modify(|state| state.is_loading = is_loading);
    }

    /// Receiver that observes every later state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.sender.subscribe()
    }
}

impl Default for AuthHandle {
    fn default() -> Self {
        Self::new(AuthState::signed_out())
    }
}

impl fmt::Debug for AuthHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthHandle")
            .field("state", &*self.sender.borrow())
            .finish()
    }
}
