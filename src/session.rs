//! Identity boundary and the session gate
//!
//! How users authenticate is outside this crate. An [`IdentityProvider`]
//! answers whether someone is signed in, and the [`SessionGate`] turns that
//! answer into an observable state the dashboard checks before producing
//! any view.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{DashboardError, Result};

/// The signed-in user, as far as the dashboard cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Gate state. Starts `Unresolved` until the provider has been asked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unresolved,
    Authenticated(Identity),
    Anonymous,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Opaque authentication backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// The current identity, if any.
    async fn current(&self) -> Result<Option<Identity>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;

    async fn sign_out(&self) -> Result<()>;

    async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.current().await?.is_some())
    }
}

/// Fixed identity answers for fixture and embedded use.
#[derive(Debug)]
pub struct StaticIdentity {
    current: RwLock<Option<Identity>>,
    accept_sign_in: bool,
}

impl StaticIdentity {
    /// Already signed in as `identity`; sign-ins are accepted.
    pub fn signed_in(identity: Identity) -> Self {
        Self { current: RwLock::new(Some(identity)), accept_sign_in: true }
    }

    /// Signed out; any sign-in is accepted.
    pub fn signed_out() -> Self {
        Self { current: RwLock::new(None), accept_sign_in: true }
    }

    /// Signed out, and every sign-in is rejected.
    pub fn locked() -> Self {
        Self { current: RwLock::new(None), accept_sign_in: false }
    }

    /// The identity used by fixture-backed dashboards.
    pub fn fixture_user() -> Identity {
        Identity { user_id: "fixture-user".to_string(), email: None }
    }

    fn set(&self, identity: Option<Identity>) {
        *self.current.write() = identity;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current(&self) -> Result<Option<Identity>> {
        Ok(self.current.read().clone())
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<Identity> {
        if !self.accept_sign_in {
            return Err(DashboardError::Unauthenticated);
        }
        let identity =
            Identity { user_id: format!("static:{email}"), email: Some(email.to_string()) };
        self.set(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.set(None);
        Ok(())
    }
}

/// Observable authentication state backed by an [`IdentityProvider`].
pub struct SessionGate {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<SessionState>,
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate").field("state", &*self.state.borrow()).finish()
    }
}

impl SessionGate {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::Unresolved);
        Self { provider, state }
    }

    /// Ask the provider and publish the answer.
    ///
    /// A provider error resolves the gate to `Anonymous` and is returned.
    pub async fn resolve(&self) -> Result<SessionState> {
        let next = match self.provider.current().await {
            Ok(Some(identity)) => SessionState::Authenticated(identity),
            Ok(None) => SessionState::Anonymous,
            Err(e) => {
                warn!(error = %e, "Identity provider failed, treating session as anonymous");
                self.state.send_replace(SessionState::Anonymous);
                return Err(e);
            }
        };
        debug!(authenticated = next.is_authenticated(), "Session resolved");
        self.state.send_replace(next.clone());
        Ok(next)
    }

    /// Wait until the gate has an answer.
    pub async fn wait_resolved(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| *s != SessionState::Unresolved).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close while we wait
            Err(_) => self.state(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// The signed-in identity, or [`DashboardError::Unauthenticated`].
    pub fn require_authenticated(&self) -> Result<Identity> {
        match &*self.state.borrow() {
            SessionState::Authenticated(identity) => Ok(identity.clone()),
            _ => Err(DashboardError::Unauthenticated),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        match self.provider.sign_in(email, password).await {
            Ok(identity) => {
                info!(user_id = %identity.user_id, "Signed in");
                self.state.send_replace(SessionState::Authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                self.state.send_replace(SessionState::Anonymous);
                Err(e)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.provider.sign_out().await?;
        info!("Signed out");
        self.state.send_replace(SessionState::Anonymous);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gate_starts_unresolved() {
        let gate = SessionGate::new(Arc::new(StaticIdentity::signed_in(StaticIdentity::fixture_user())));
        assert_eq!(gate.state(), SessionState::Unresolved);
        assert!(matches!(gate.require_authenticated(), Err(DashboardError::Unauthenticated)));

        gate.resolve().await.unwrap();
        assert!(gate.is_authenticated());
        assert_eq!(gate.require_authenticated().unwrap().user_id, "fixture-user");
    }

    #[tokio::test]
    async fn wait_resolved_sees_later_resolution() {
        let gate = SessionGate::new(Arc::new(StaticIdentity::signed_out()));
        let (state, resolved) = tokio::join!(gate.wait_resolved(), gate.resolve());
        assert_eq!(state, SessionState::Anonymous);
        assert_eq!(resolved.unwrap(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn sign_in_and_out() {
        let gate = SessionGate::new(Arc::new(StaticIdentity::signed_out()));
        gate.resolve().await.unwrap();
        assert!(!gate.is_authenticated());

        let identity = gate.sign_in("ops@example.am", "secret").await.unwrap();
        assert_eq!(identity.email.as_deref(), Some("ops@example.am"));
        assert!(gate.is_authenticated());

        gate.sign_out().await.unwrap();
        assert_eq!(gate.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn locked_provider_rejects_sign_in() {
        let gate = SessionGate::new(Arc::new(StaticIdentity::locked()));
        let err = gate.sign_in("ops@example.am", "secret").await.unwrap_err();
        assert!(matches!(err, DashboardError::Unauthenticated));
        assert!(!gate.is_authenticated());
    }
}
