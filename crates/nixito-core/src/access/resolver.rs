//! Resolves what a principal may do inside its organization

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::identity::Principal;
use crate::model::{AccessView, Organization, Profile};
use crate::storage::AccessStore;

/// Last completed resolution plus the loading/error flags.
///
/// `loading` and `error` are independent: a failed refresh of the same
/// principal leaves the previous profile, organization and sets in place
/// with `error` filled. A failure for a different principal clears them.
#[derive(Debug, Clone)]
pub struct AccessSnapshot {
    profile: Option<Profile>,
    organization: Option<Organization>,
    roles: Vec<String>,
    permissions: HashSet<String>,
    loading: bool,
    error: Option<Arc<CoreError>>,
    generation: u64,
}

impl Default for AccessSnapshot {
    fn default() -> Self {
        Self {
            profile: None,
            organization: None,
            roles: Vec::new(),
            permissions: HashSet::new(),
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

impl AccessSnapshot {
    /// Snapshot for a fully resolved principal
    pub fn from_view(profile: Profile, organization: Organization, view: AccessView) -> Self {
        let mut roles = Vec::with_capacity(view.roles.len());
        for role in view.roles {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        Self {
            profile: Some(profile),
            organization: Some(organization),
            roles,
            permissions: view.permissions.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Snapshot that has not finished its first resolution
    pub fn pending() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn organization(&self) -> Option<&Organization> {
        self.organization.as_ref()
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn permissions(&self) -> &HashSet<String> {
        &self.permissions
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&CoreError> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        !self.loading && self.permissions.contains(permission)
    }

    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        !self.loading && permissions.iter().any(|p| self.permissions.contains(*p))
    }

    /// Vacuously true for an empty list once loaded
    pub fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        !self.loading && permissions.iter().all(|p| self.permissions.contains(*p))
    }

    pub fn has_role(&self, role: &str) -> bool {
        !self.loading && self.roles.iter().any(|r| r == role)
    }

    pub fn require_organization(&self) -> CoreResult<&Organization> {
        self.organization
            .as_ref()
            .ok_or_else(CoreError::no_organization)
    }
}

/// Result of one call to [`AccessResolver::resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Profile, access view and organization loaded and published
    Resolved,
    /// No principal; the empty snapshot was published
    Empty,
    /// A read failed; the error slot was set, and prior data kept only when
    /// the principal did not change
    Failed,
    /// A newer resolution was issued while this one was in flight
    Superseded,
}

/// Loads and publishes [`AccessSnapshot`]s for the current principal.
pub struct AccessResolver {
    store: Arc<dyn AccessStore>,
    state: watch::Sender<AccessSnapshot>,
    generation: AtomicU64,
    principal: Mutex<Option<Principal>>,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        let (state, _rx) = watch::channel(AccessSnapshot::pending());
        Self {
            store,
            state,
            generation: AtomicU64::new(0),
            principal: Mutex::new(None),
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> AccessSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AccessSnapshot> {
        self.state.subscribe()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal.lock().clone()
    }

    /// Resolve access for `principal`, replacing whatever was resolved before.
    pub async fn resolve(&self, principal: Option<Principal>) -> ResolveOutcome {
        // Principal and generation move together so `refresh` always sees
        // the principal of the latest issued generation.
        let generation = {
            let mut current = self.principal.lock();
            *current = principal.clone();
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let Some(principal) = principal else {
            let published = self.publish(generation, |state| {
                *state = AccessSnapshot {
                    generation,
                    ..AccessSnapshot::default()
                };
            });
            return if published {
                ResolveOutcome::Empty
            } else {
                ResolveOutcome::Superseded
            };
        };

        self.publish(generation, |state| state.loading = true);

        let result = self.load(&principal).await;

        let mut outcome = ResolveOutcome::Superseded;
        self.publish(generation, |state| match result {
            Ok(mut resolved) => {
                debug!(
                    principal = %principal.id,
                    roles = resolved.roles.len(),
                    permissions = resolved.permissions.len(),
                    generation,
                    "Access resolved"
                );
                resolved.generation = generation;
                *state = resolved;
                outcome = ResolveOutcome::Resolved;
            }
            Err(err) => {
                warn!(principal = %principal.id, error = %err, "Access resolution failed");
                let same_principal =
                    state.profile.as_ref().map(|p| p.id.as_str()) == Some(principal.id.as_str());
                if !same_principal {
                    *state = AccessSnapshot::default();
                }
                state.loading = false;
                state.error = Some(Arc::new(err));
                state.generation = generation;
                outcome = ResolveOutcome::Failed;
            }
        });

        if outcome == ResolveOutcome::Superseded {
            debug!(principal = %principal.id, generation, "Discarding superseded resolution");
        }
        outcome
    }

    /// Re-resolve the last principal passed to [`AccessResolver::resolve`]
    pub async fn refresh(&self) -> ResolveOutcome {
        let principal = self.principal();
        self.resolve(principal).await
    }

    /// Follow an identity channel, re-resolving on every change until the
    /// sending side is dropped.
    pub async fn run(&self, mut identity: watch::Receiver<Option<Principal>>) {
        loop {
            let principal = identity.borrow_and_update().clone();
            self.resolve(principal).await;
            if identity.changed().await.is_err() {
                break;
            }
        }
    }

    async fn load(&self, principal: &Principal) -> CoreResult<AccessSnapshot> {
        let (profile, view) = tokio::join!(
            self.store.get_profile(&principal.id),
            self.store.get_access_view(&principal.id)
        );
        let profile = profile?;
        let view = view?;
        let organization = self.store.get_organization(&profile.org_id).await?;
        Ok(AccessSnapshot::from_view(profile, organization, view))
    }

    /// Apply `update` only while `generation` is still the latest issued.
    /// The check runs under the channel lock so it cannot interleave with a
    /// newer resolution's writes.
    fn publish(&self, generation: u64, update: impl FnOnce(&mut AccessSnapshot)) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(state);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OnboardRequest, OrganizationUpdate, ProfileUpdate};
    use crate::plugins::{PluginInstallation, PluginSummary};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    /// In-memory store whose "slow" principal blocks until released
    #[derive(Default)]
    struct FakeStore {
        profiles: HashMap<String, (Profile, AccessView)>,
        fail_org: AtomicBool,
        slow_entered: Notify,
        slow_release: Notify,
    }

    impl FakeStore {
        fn with(mut self, id: &str, permissions: &[&str]) -> Self {
            let profile = Profile {
                id: id.to_string(),
                org_id: "org-1".to_string(),
                email: format!("{}@example.com", id),
                full_name: None,
                avatar_url: None,
            };
            let view = AccessView {
                roles: vec!["member".to_string()],
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            };
            self.profiles.insert(id.to_string(), (profile, view));
            self
        }
    }

    fn unsupported<T>() -> CoreResult<T> {
        Err(CoreError::Transport("unsupported in fake".to_string()))
    }

    #[async_trait]
    impl AccessStore for FakeStore {
        async fn get_profile(&self, principal_id: &str) -> CoreResult<Profile> {
            if principal_id == "slow" {
                self.slow_entered.notify_one();
                self.slow_release.notified().await;
            }
            self.profiles
                .get(principal_id)
                .map(|(p, _)| p.clone())
                .ok_or_else(|| CoreError::not_found("profile", principal_id))
        }

        async fn get_access_view(&self, principal_id: &str) -> CoreResult<AccessView> {
            self.profiles
                .get(principal_id)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| CoreError::not_found("access view", principal_id))
        }

        async fn get_organization(&self, org_id: &str) -> CoreResult<Organization> {
            if self.fail_org.load(Ordering::SeqCst) {
                return Err(CoreError::Transport("connection reset".to_string()));
            }
            Ok(Organization {
                id: org_id.to_string(),
                name: "Acme".to_string(),
                slug: "acme".to_string(),
            })
        }

        async fn list_catalog_plugins(&self, _: bool) -> CoreResult<Vec<PluginSummary>> {
            unsupported()
        }
        async fn list_installations(&self, _: &str) -> CoreResult<Vec<PluginInstallation>> {
            unsupported()
        }
        async fn install_plugin(&self, _: &str, _: &str) -> CoreResult<()> {
            unsupported()
        }
        async fn enable_plugin(&self, _: &str, _: &str) -> CoreResult<()> {
            unsupported()
        }
        async fn disable_plugin(&self, _: &str, _: &str) -> CoreResult<()> {
            unsupported()
        }
        async fn mark_plugin_error(&self, _: &str, _: &str, _: &str) -> CoreResult<()> {
            unsupported()
        }
        async fn update_profile(&self, _: &str, _: &ProfileUpdate) -> CoreResult<()> {
            unsupported()
        }
        async fn update_organization(&self, _: &str, _: &OrganizationUpdate) -> CoreResult<()> {
            unsupported()
        }
        async fn onboard(&self, _: &Principal, _: &OnboardRequest) -> CoreResult<Organization> {
            unsupported()
        }
    }

    fn snapshot_with(permissions: &[&str], roles: &[&str]) -> AccessSnapshot {
        AccessSnapshot::from_view(
            Profile {
                id: "u1".into(),
                org_id: "o1".into(),
                email: "u1@example.com".into(),
                full_name: None,
                avatar_url: None,
            },
            Organization {
                id: "o1".into(),
                name: "Acme".into(),
                slug: "acme".into(),
            },
            AccessView {
                roles: roles.iter().map(|r| r.to_string()).collect(),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            },
        )
    }

    #[test]
    fn predicates_are_membership_tests() {
        let snapshot = snapshot_with(&["a", "b"], &["admin", "member"]);

        assert!(snapshot.has_permission("a"));
        assert!(!snapshot.has_permission("c"));
        assert!(snapshot.has_any_permission(&["c", "b"]));
        assert!(!snapshot.has_any_permission(&["c"]));
        assert!(snapshot.has_all_permissions(&["a", "b"]));
        assert!(!snapshot.has_all_permissions(&["a", "c"]));
        assert!(snapshot.has_all_permissions(&[]));
        assert!(!snapshot.has_any_permission(&[]));
        assert!(snapshot.has_role("admin"));
        assert!(!snapshot.has_role("owner"));
    }

    #[test]
    fn predicates_are_false_while_loading() {
        let mut snapshot = snapshot_with(&["a"], &["owner"]);
        snapshot.loading = true;

        assert!(!snapshot.has_permission("a"));
        assert!(!snapshot.has_any_permission(&["a"]));
        assert!(!snapshot.has_all_permissions(&["a"]));
        assert!(!snapshot.has_all_permissions(&[]));
        assert!(!snapshot.has_role("owner"));
    }

    #[test]
    fn empty_snapshot_has_no_organization() {
        let err = AccessSnapshot::default().require_organization().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Precondition);
    }

    #[tokio::test]
    async fn resolves_and_clears_on_sign_out() {
        let resolver = AccessResolver::new(Arc::new(FakeStore::default().with("u1", &["a"])));
        assert!(resolver.snapshot().is_loading());

        let outcome = resolver.resolve(Some(Principal::new("u1"))).await;
        assert_eq!(outcome, ResolveOutcome::Resolved);
        let snapshot = resolver.snapshot();
        assert!(snapshot.has_permission("a"));
        assert_eq!(snapshot.organization().map(|o| o.id.as_str()), Some("org-1"));

        assert_eq!(resolver.resolve(None).await, ResolveOutcome::Empty);
        let snapshot = resolver.snapshot();
        assert!(snapshot.profile().is_none());
        assert!(snapshot.permissions().is_empty());
        assert!(snapshot.error().is_none());
        assert!(!snapshot.is_loading());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_data() {
        let store = Arc::new(FakeStore::default().with("u1", &["a"]));
        let resolver = AccessResolver::new(store.clone());
        resolver.resolve(Some(Principal::new("u1"))).await;

        store.fail_org.store(true, Ordering::SeqCst);
        assert_eq!(resolver.refresh().await, ResolveOutcome::Failed);

        let snapshot = resolver.snapshot();
        assert!(!snapshot.is_loading());
        assert!(snapshot.error().is_some());
        assert!(snapshot.has_permission("a"));
        assert!(snapshot.profile().is_some());
    }

    #[tokio::test]
    async fn failure_for_new_principal_drops_previous_access() {
        let resolver = AccessResolver::new(Arc::new(FakeStore::default().with("u1", &["a"])));
        resolver.resolve(Some(Principal::new("u1"))).await;

        let outcome = resolver.resolve(Some(Principal::new("ghost"))).await;
        assert_eq!(outcome, ResolveOutcome::Failed);

        let snapshot = resolver.snapshot();
        assert!(snapshot.error().is_some());
        assert!(!snapshot.has_permission("a"));
        assert!(snapshot.profile().is_none());
        assert!(snapshot.organization().is_none());
        assert!(snapshot.roles().is_empty());
    }

    #[tokio::test]
    async fn refresh_uses_principal_of_latest_resolution() {
        let store = Arc::new(
            FakeStore::default()
                .with("slow", &["old"])
                .with("fast", &["new"]),
        );
        let resolver = Arc::new(AccessResolver::new(store.clone()));

        let older = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve(Some(Principal::new("slow"))).await })
        };
        store.slow_entered.notified().await;
        resolver.resolve(Some(Principal::new("fast"))).await;
        store.slow_release.notify_one();
        older.await.unwrap();

        assert_eq!(resolver.principal().map(|p| p.id), Some("fast".to_string()));
        assert_eq!(resolver.refresh().await, ResolveOutcome::Resolved);
        assert!(resolver.snapshot().has_permission("new"));
    }

    #[tokio::test]
    async fn missing_profile_is_an_error_state() {
        let resolver = AccessResolver::new(Arc::new(FakeStore::default()));
        let outcome = resolver.resolve(Some(Principal::new("ghost"))).await;
        assert_eq!(outcome, ResolveOutcome::Failed);
        assert_eq!(
            resolver.snapshot().error().map(|e| e.kind()),
            Some(crate::error::ErrorKind::NotFound)
        );
    }

    #[tokio::test]
    async fn slower_older_resolution_is_discarded() {
        let store = Arc::new(
            FakeStore::default()
                .with("slow", &["old"])
                .with("fast", &["new"]),
        );
        let resolver = Arc::new(AccessResolver::new(store.clone()));

        let older = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve(Some(Principal::new("slow"))).await })
        };
        store.slow_entered.notified().await;

        let newer = resolver.resolve(Some(Principal::new("fast"))).await;
        assert_eq!(newer, ResolveOutcome::Resolved);

        store.slow_release.notify_one();
        assert_eq!(older.await.unwrap(), ResolveOutcome::Superseded);

        let snapshot = resolver.snapshot();
        assert!(snapshot.has_permission("new"));
        assert!(!snapshot.has_permission("old"));
        assert_eq!(snapshot.profile().map(|p| p.id.as_str()), Some("fast"));
    }

    #[tokio::test]
    async fn run_follows_identity_changes() {
        let store = Arc::new(FakeStore::default().with("u1", &["a"]));
        let resolver = Arc::new(AccessResolver::new(store));
        let session = crate::identity::IdentitySession::new();
        let mut updates = resolver.subscribe();

        let task = {
            let resolver = resolver.clone();
            let identity = session.subscribe();
            tokio::spawn(async move { resolver.run(identity).await })
        };

        session.set(Some(Principal::new("u1")));
        updates
            .wait_for(|s| s.has_permission("a"))
            .await
            .expect("resolver published");

        drop(session);
        task.await.unwrap();
    }
}
