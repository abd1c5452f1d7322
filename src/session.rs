//! Session store and login state machine.
//!
//! ```text
//! LoggedOut ──login──▶ LoggingIn ──success──▶ LoggedIn ──logout──▶ LoggedOut
//!                        │   ▲  │
//!                 failure│   │  └──cancel──▶ LoggedOut
//!                        ▼   │login
//!                      LoginFailed ──logout──▶ LoggedOut
//! ```
//!
//! A [`SessionStore::login`] call dropped before the service answers cancels
//! its attempt, so the session never stays in `LoggingIn`.
//!
//! The credential exists only in `LoggedIn` and is exactly the one the login
//! call returned.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::api::PostsApi;
use crate::error::{Error, Result};
use crate::model::{Credential, LoginRequest, User};
use crate::subscription::{Handle, listen};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggingIn,
    LoggedIn(User),
    LoginFailed(Error),
}

impl SessionState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LoggedOut => "logged out",
            Self::LoggingIn => "logging in",
            Self::LoggedIn(_) => "logged in",
            Self::LoginFailed(_) => "login failed",
        }
    }

    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::LoggedIn(user) => Some(user),
            _ => None,
        }
    }

    pub const fn credential(&self) -> Option<&Credential> {
        match self {
            Self::LoggedIn(user) => Some(&user.token),
            _ => None,
        }
    }

    pub const fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn(_))
    }
}

/// Holds the current login state and notifies listeners of every transition.
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionState>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(SessionState::LoggedOut)),
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.lock().user().cloned()
    }

    /// The credential for authenticated calls, or [`Error::Unauthenticated`].
    pub fn credential(&self) -> Result<Credential> {
        self.lock().credential().cloned().ok_or(Error::Unauthenticated)
    }

    /// Logs in through `api`, driving the state machine on both sides of the call.
    pub async fn login(&self, api: &PostsApi, request: &LoginRequest) -> Result<User> {
        self.begin_login()?;
        let mut attempt = PendingLogin {
            session: self,
            armed: true,
        };
        info!(username = %request.username, "Logging in");
        let outcome = api.login(request).await;
        attempt.armed = false;
        self.complete_login(outcome)
    }

    /// `LoggedOut | LoginFailed --login--> LoggingIn`.
    pub fn begin_login(&self) -> Result<()> {
        self.transition("log in", |state| match state {
            SessionState::LoggedOut | SessionState::LoginFailed(_) => Some(SessionState::LoggingIn),
            _ => None,
        })
        .map(drop)
    }

    /// `LoggingIn --success--> LoggedIn` or `LoggingIn --failure--> LoginFailed`.
    ///
    /// A user record without a credential counts as a failure. Returns the user
    /// on success and the login error on failure.
    pub fn complete_login(&self, outcome: Result<User>) -> Result<User> {
        let outcome = outcome.and_then(|user| {
            if user.token.is_empty() {
                Err(Error::Decode("login response carried an empty credential".to_string()))
            } else {
                Ok(user)
            }
        });

        let next = match &outcome {
            Ok(user) => SessionState::LoggedIn(user.clone()),
            Err(error) => SessionState::LoginFailed(error.clone()),
        };
        self.transition("complete login", move |state| {
            matches!(state, SessionState::LoggingIn).then_some(next)
        })?;

        match &outcome {
            Ok(user) => info!(user_id = user.id, username = %user.username, "Logged in"),
            Err(error) => warn!(%error, "Login failed"),
        }
        outcome
    }

    /// `LoggingIn --cancel--> LoggedOut`, abandoning an attempt without an outcome.
    pub fn cancel_login(&self) -> Result<()> {
        self.transition("cancel login", |state| {
            matches!(state, SessionState::LoggingIn).then_some(SessionState::LoggedOut)
        })?;
        info!("Login cancelled");
        Ok(())
    }

    /// `LoggedIn | LoginFailed --logout--> LoggedOut`; a no-op when already logged out.
    pub fn logout(&self) -> Result<()> {
        let mut state = self.lock();
        match &*state {
            SessionState::LoggedOut => Ok(()),
            SessionState::LoggingIn => Err(Error::InvalidTransition {
                state: state.name(),
                event: "log out",
            }),
            SessionState::LoggedIn(_) | SessionState::LoginFailed(_) => {
                *state = SessionState::LoggedOut;
                let _ = self.events.send(SessionState::LoggedOut);
                info!("Logged out");
                Ok(())
            }
        }
    }

    /// Calls `listener` with the new state after every transition until the
    /// handle is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Handle
    where
        F: Fn(SessionState) + Send + 'static,
    {
        listen(self.events.subscribe(), listener)
    }

    /// A receiver for every state entered from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionState> {
        self.events.subscribe()
    }

    /// A stream of the current state followed by every state entered later.
    ///
    /// States missed by a lagging consumer are skipped.
    pub fn watch(&self) -> BoxStream<'static, SessionState> {
        let rx = self.events.subscribe();
        let current = self.state();
        let changes = BroadcastStream::new(rx).filter_map(Result::ok);
        Box::pin(tokio_stream::once(current).chain(changes))
    }

    fn transition<F>(&self, event: &'static str, next: F) -> Result<SessionState>
    where
        F: FnOnce(&SessionState) -> Option<SessionState>,
    {
        let mut state = self.lock();
        let Some(next) = next(&state) else {
            return Err(Error::InvalidTransition {
                state: state.name(),
                event,
            });
        };
        *state = next.clone();
        // Sent under the lock so listeners see transitions in order.
        let _ = self.events.send(next.clone());
        Ok(next)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cancels the login attempt it guards unless disarmed first.
struct PendingLogin<'a> {
    session: &'a SessionStore,
    armed: bool,
}

impl Drop for PendingLogin<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.session.cancel_login();
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
