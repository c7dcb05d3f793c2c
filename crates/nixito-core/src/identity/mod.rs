//! Identity session boundary
//!
//! Credential verification and token issuance live in an external identity
//! provider. The core only sees the resulting principal through
//! [`IdentitySession`], which publishes every change on a watch channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Opaque authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Holder of the current principal for one session.
///
/// Providers push sign-in/sign-out results in with [`IdentitySession::set`];
/// consumers read [`IdentitySession::current`] or follow [`IdentitySession::subscribe`].
pub struct IdentitySession {
    tx: watch::Sender<Option<Principal>>,
}

impl Default for IdentitySession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySession {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn with_principal(principal: Principal) -> Self {
        let (tx, _rx) = watch::channel(Some(principal));
        Self { tx }
    }

    pub fn current(&self) -> Option<Principal> {
        self.tx.borrow().clone()
    }

    /// Replace the current principal. Returns true when the identity changed.
    ///
    /// Token refreshes that keep the same principal do not notify subscribers.
    pub fn set(&self, principal: Option<Principal>) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == principal {
                return false;
            }
            tracing::debug!(
                principal = principal.as_ref().map(|p| p.id.as_str()).unwrap_or("<none>"),
                "Identity changed"
            );
            *current = principal;
            true
        })
    }

    pub fn clear(&self) -> bool {
        self.set(None)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.tx.subscribe()
    }
}

/// Outcome of a provider call that may establish a principal
#[derive(Debug, Clone)]
pub struct SignInResult {
    pub principal: Principal,
}

/// External identity provider surface. Implementations are expected to
/// update an [`IdentitySession`] on success.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_principal(&self) -> Option<Principal>;

    fn subscribe(&self) -> watch::Receiver<Option<Principal>>;

    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<SignInResult>;

    async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<SignInResult>;

    async fn sign_out(&self) -> anyhow::Result<()>;
}
