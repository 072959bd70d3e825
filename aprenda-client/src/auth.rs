//! Auth/session context
//!
//! Single source of truth for "who is signed in" and "are they an admin".
//! State is published through a watch channel: callers read a consistent
//! snapshot or subscribe to transitions. Only the auth event loop and
//! `refetch_profile` mutate the state.

use std::sync::{Arc, Weak};

use serde_json::json;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use aprenda_core::{AuthEvent, AuthUser, Profile, Query, Session, UserId};

use crate::error::{ClientError, Result};
use crate::gateway::{AuthApi, Datastore};

/// Outer lifecycle of the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
}

/// One consistent view of the auth state
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub phase: AuthPhase,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
}

impl AuthSnapshot {
    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user().map(|u| u.id)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, AuthPhase::Uninitialized | AuthPhase::Loading)
    }

    /// True only once loading has settled; an admin flag is never derived
    /// from a half-initialized state
    pub fn is_admin(&self) -> bool {
        !self.is_loading()
            && self
                .profile
                .as_ref()
                .map(Profile::is_admin)
                .unwrap_or(false)
    }
}

pub struct AuthSession {
    datastore: Arc<dyn Datastore>,
    state: watch::Sender<AuthSnapshot>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl AuthSession {
    /// Resolve the initial session, then keep following the gateway's
    /// auth events until dropped
    pub async fn start(auth_api: Arc<dyn AuthApi>, datastore: Arc<dyn Datastore>) -> Arc<Self> {
        let (state, _) = watch::channel(AuthSnapshot {
            phase: AuthPhase::Loading,
            session: None,
            profile: None,
        });

        // Subscribe before the initial session check so no event between
        // the two is lost
        let events = auth_api.auth_events();

        let session = match auth_api.get_session().await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(error = %err, "initial session check failed");
                None
            }
        };
        let profile = match &session {
            Some(session) => fetch_profile(datastore.as_ref(), session.user.id).await,
            None => None,
        };
        state.send_replace(AuthSnapshot {
            phase: settled_phase(&session),
            session,
            profile,
        });

        let auth = Arc::new(AuthSession {
            datastore,
            state,
            event_loop: Mutex::new(None),
        });

        // The task holds a weak reference so dropping the last handle to
        // the session also ends the loop
        let handle = tokio::spawn(Self::run_event_loop(Arc::downgrade(&auth), events));
        *auth.event_loop.lock().await = Some(handle);
        auth
    }

    async fn run_event_loop(this: Weak<Self>, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth events lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(auth) = this.upgrade() else {
                break;
            };

            match event {
                AuthEvent::SignedIn(session)
                | AuthEvent::TokenRefreshed(session)
                | AuthEvent::InitialSession(Some(session)) => {
                    let profile =
                        fetch_profile(auth.datastore.as_ref(), session.user.id).await;
                    auth.state.send_replace(AuthSnapshot {
                        phase: AuthPhase::Authenticated,
                        session: Some(session),
                        profile,
                    });
                }
                AuthEvent::InitialSession(None) | AuthEvent::SignedOut => {
                    auth.state.send_replace(AuthSnapshot {
                        phase: AuthPhase::Anonymous,
                        session: None,
                        profile: None,
                    });
                }
            }
        }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Watch auth state transitions
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.state.borrow().user_id()
    }

    pub fn is_admin(&self) -> bool {
        self.state.borrow().is_admin()
    }

    /// The signed-in user, or `SignInRequired` for the caller to route to
    /// the login page
    pub fn require_user(&self) -> Result<AuthUser> {
        self.state
            .borrow()
            .user()
            .cloned()
            .ok_or(ClientError::SignInRequired)
    }

    /// Re-run the profile fetch for the current user, e.g. after a
    /// profile edit. The outer phase never changes here.
    pub async fn refetch_profile(&self) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        let profile = fetch_profile(self.datastore.as_ref(), user_id).await;
        self.state.send_modify(|snapshot| snapshot.profile = profile);
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.event_loop.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

fn settled_phase(session: &Option<Session>) -> AuthPhase {
    if session.is_some() {
        AuthPhase::Authenticated
    } else {
        AuthPhase::Anonymous
    }
}

/// Profile lookup that never fails the auth state: a missing or broken
/// profile is logged and reported as absent
async fn fetch_profile(datastore: &dyn Datastore, user_id: UserId) -> Option<Profile> {
    let query = Query::table("profiles").eq("id", json!(user_id.to_string()));
    match datastore.select_one(&query).await {
        Ok(Some(row)) => match serde_json::from_value(row) {
            Ok(profile) => Some(profile),
            Err(err) => {
                tracing::error!(error = %err, %user_id, "profile row failed to decode");
                None
            }
        },
        Ok(None) => {
            tracing::warn!(%user_id, "no profile row for user");
            None
        }
        Err(err) => {
            tracing::error!(error = %err, %user_id, "profile fetch failed");
            None
        }
    }
}
