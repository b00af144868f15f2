//! Portal controller: wires the session, the data store, the permission
//! resolver, the favorites store and the sync channel together the way the
//! dashboard, sidebar and module pages consume them.
//!
//! `load` fetches the catalog and the identity's grants concurrently and only
//! resolves once both have completed. Results that arrive after the identity
//! changed are dropped. Favorites are re-hydrated when the identity or the
//! catalog changes and reconciled against every successfully resolved
//! allowed set.
//!
//! Resolved access is stamped with the identity token it was loaded for.
//! Once the session moves on (sign-in as someone else, sign-out) the cached
//! state reads as loading or signed out until the next `load`, so one
//! identity's modules and favorites never show through to another.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::{Catalog, ModuleDescriptor};
use crate::datastore::DataStore;
use crate::error::{PortalError, PortalResult};
use crate::favorites::{FavoritesStore, ToggleOutcome};
use crate::permissions::{AccessState, IdentityId};
use crate::routing::{RouteDecision, RouteGuard};
use crate::session::{IdentityToken, Session};
use crate::storage::KeyValueStorage;
use crate::sync::{SyncChannel, SyncEvent};

#[derive(Debug, Default)]
struct PortalState {
    catalog: Option<Catalog>,
    /// Last resolved access and the identity it belongs to
    access: Option<(IdentityToken, AccessState)>,
    search_query: String,
    /// Identity and catalog the favorites store was last hydrated against
    favorites_basis: Option<(Option<IdentityId>, Catalog)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardStatus {
    Loading,
    Unauthenticated,
    /// Signed in with zero allowed modules
    Empty,
    Ready,
    Error,
}

/// Everything the dashboard renders in one snapshot
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub display_name: Option<String>,
    pub initials: Option<String>,
    #[serde(skip)]
    pub access: AccessState,
    pub status: DashboardStatus,
    pub modules: Vec<ModuleDescriptor>,
    pub favorites: Vec<ModuleDescriptor>,
    pub search_query: String,
    pub error: Option<String>,
}

pub struct Portal {
    data_store: Arc<dyn DataStore>,
    session: Arc<Session>,
    favorites: Arc<FavoritesStore>,
    channel: Arc<SyncChannel>,
    guard: RouteGuard,
    state: Mutex<PortalState>,
}

impl Portal {
    pub fn new(
        data_store: Arc<dyn DataStore>,
        session: Arc<Session>,
        storage: Arc<dyn KeyValueStorage>,
        channel: Arc<SyncChannel>,
    ) -> Self {
        let favorites = Arc::new(FavoritesStore::new(storage, Arc::clone(&channel)));
        Self::with_favorites(data_store, session, favorites, channel)
    }

    pub fn with_favorites(
        data_store: Arc<dyn DataStore>,
        session: Arc<Session>,
        favorites: Arc<FavoritesStore>,
        channel: Arc<SyncChannel>,
    ) -> Self {
        Self {
            data_store,
            session,
            favorites,
            channel,
            guard: RouteGuard::default(),
            state: Mutex::new(PortalState::default()),
        }
    }

    pub fn with_guard(mut self, guard: RouteGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn favorites(&self) -> &Arc<FavoritesStore> {
        &self.favorites
    }

    pub fn channel(&self) -> &Arc<SyncChannel> {
        &self.channel
    }

    pub fn data_store(&self) -> &Arc<dyn DataStore> {
        &self.data_store
    }

    /// Current access state; `Loading` until the first load completes
    /// Access for the identity currently signed in.
    ///
    /// State loaded for an earlier identity is never returned.
    pub fn access(&self) -> AccessState {
        let state = self.lock();
        match &state.access {
            Some((token, access)) if self.session.is_current(token) => access.clone(),
            _ if !self.session.is_authenticated() => AccessState::Unauthenticated,
            _ => AccessState::Loading,
        }
    }

    pub fn catalog(&self) -> Option<Catalog> {
        self.lock().catalog.clone()
    }

    /// Fetch catalog and grants for the current identity and apply the result.
    ///
    /// Also serves as the retry affordance after a failed load.
    pub async fn load(&self) -> AccessState {
        let token = self.session.begin();
        let Some(identity) = token.identity().cloned() else {
            self.apply_signed_out();
            return AccessState::Unauthenticated;
        };

        self.lock().access = Some((token.clone(), AccessState::Loading));
        tracing::debug!(identity = %identity, "loading catalog and grants");

        let (catalog, grants) = tokio::join!(
            self.data_store.fetch_catalog(),
            self.data_store.fetch_grants(&identity)
        );

        if !self.session.is_current(&token) {
            tracing::debug!(identity = %identity, "identity changed during load; discarding result");
            return self.access();
        }

        let access = AccessState::from_fetches(catalog.as_ref(), grants.as_deref(), Some(&identity));

        if let Ok(catalog) = &catalog {
            self.ensure_favorites_hydrated(Some(&identity), catalog);
        }
        if let AccessState::Ready(_) = &access {
            self.favorites.reconcile(&access.allowed_paths());
        }

        {
            let mut state = self.lock();
            if let Ok(catalog) = catalog {
                state.catalog = Some(catalog);
            }
            state.access = Some((token, access.clone()));
        }

        match &access {
            AccessState::Ready(modules) => {
                tracing::info!(identity = %identity, modules = modules.len(), "modules resolved")
            }
            AccessState::Unauthenticated => {
                tracing::info!("session rejected by data store; signing out");
                self.sign_out();
            }
            _ => {}
        }
        access
    }

    pub fn sign_out(&self) {
        self.session.sign_out();
        self.apply_signed_out();
    }

    fn apply_signed_out(&self) {
        let catalog = self.catalog().unwrap_or_default();
        self.ensure_favorites_hydrated(None, &catalog);
        let token = self.session.begin();
        self.lock().access = Some((token, AccessState::Unauthenticated));
    }

    fn ensure_favorites_hydrated(&self, identity: Option<&IdentityId>, catalog: &Catalog) {
        let stale = {
            let state = self.lock();
            match &state.favorites_basis {
                Some((basis_identity, basis_catalog)) => {
                    basis_identity.as_ref() != identity || basis_catalog != catalog
                }
                None => true,
            }
        };
        if stale {
            self.favorites.hydrate(identity, catalog);
            self.lock().favorites_basis = Some((identity.cloned(), catalog.clone()));
        }
    }

    /// Flip a favorite for a module the identity can currently see.
    ///
    /// Until favorites are hydrated for the signed-in identity the toggle is
    /// queued and applied by the next `load`.
    pub fn toggle_favorite(&self, path: &str) -> PortalResult<ToggleOutcome> {
        let Some(identity) = self.session.identity_id() else {
            return Err(PortalError::Unauthenticated);
        };
        if self.favorites.is_hydrated() && self.favorites.identity().as_ref() != Some(&identity) {
            tracing::debug!(identity = %identity, "favorites belong to a previous identity; suspending");
            self.favorites.suspend();
            self.lock().favorites_basis = None;
        }
        let access = self.access();
        let allowed = access.allowed_paths().contains(path);
        // Removing a stale favorite is always allowed
        if !allowed && !self.favorites.is_favorite(path) {
            if access.is_loading() {
                return Ok(self.favorites.toggle_favorite(path));
            }
            return Err(PortalError::forbidden(format!("module {} is not available", path)));
        }
        Ok(self.favorites.toggle_favorite(path))
    }

    pub fn is_favorite(&self, path: &str) -> bool {
        self.favorites_are_current() && self.favorites.is_favorite(path)
    }

    fn favorites_are_current(&self) -> bool {
        self.favorites.is_hydrated() && self.favorites.identity() == self.session.identity_id()
    }

    /// Broadcast the search box contents to whichever region renders results
    pub fn publish_search(&self, query: &str) {
        self.lock().search_query = query.to_string();
        self.channel
            .publish(SyncEvent::SearchQueryChanged(query.to_string()));
    }

    /// Allowed modules matching `query`, in catalog order
    pub fn filter_modules(&self, query: &str) -> Vec<ModuleDescriptor> {
        self.access()
            .modules()
            .iter()
            .filter(|m| m.matches_query(query))
            .cloned()
            .collect()
    }

    pub fn can_access(&self, module_key: &str) -> bool {
        self.access().can_access(module_key)
    }

    /// Storage was written by another tab or process
    pub fn on_storage_event(&self, key: &str) -> bool {
        self.favorites.on_external_change(key)
    }

    /// Route decision for `path` given the current session and access state
    pub fn guard(&self, path: &str) -> RouteDecision {
        let authenticated = self.session.is_authenticated();
        let access = self.access();
        match self.catalog() {
            Some(catalog) => self.guard.check_module(path, authenticated, &access, &catalog),
            None => self.guard.check(path, authenticated),
        }
    }

    pub fn dashboard(&self) -> DashboardView {
        let identity = self.session.current();
        let access = self.access();
        let search_query = self.lock().search_query.clone();

        let (status, error) = match &access {
            AccessState::Loading => (DashboardStatus::Loading, None),
            AccessState::Unauthenticated => (DashboardStatus::Unauthenticated, None),
            AccessState::Ready(modules) if modules.is_empty() => (DashboardStatus::Empty, None),
            AccessState::Ready(_) => (DashboardStatus::Ready, None),
            AccessState::Failed { message, .. } => (DashboardStatus::Error, Some(message.clone())),
        };
        let favorites = if self.favorites_are_current() {
            self.favorites.favorite_modules(access.modules())
        } else {
            Vec::new()
        };

        DashboardView {
            display_name: identity.as_ref().map(|i| i.display_name().to_string()),
            initials: identity.as_ref().map(|i| i.initials()),
            status,
            modules: self.filter_modules(&search_query),
            favorites,
            search_query,
            error,
            access,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PortalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
