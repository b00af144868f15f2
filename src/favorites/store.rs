use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::{Catalog, ModuleDescriptor};
use crate::favorites::normalize::{normalize, parse_stored, serialize};
use crate::permissions::IdentityId;
use crate::storage::KeyValueStorage;
use crate::sync::{SyncChannel, SyncEvent};

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Store not hydrated yet; applied once hydration completes
    Queued,
    /// Path is not in the catalog
    Ignored,
}

#[derive(Debug, Clone)]
enum PendingOp {
    Toggle(String),
    Reconcile(BTreeSet<String>),
}

#[derive(Debug, Default)]
struct FavoritesState {
    identity: Option<IdentityId>,
    catalog: Catalog,
    favorites: BTreeSet<String>,
    hydrated: bool,
    pending: Vec<PendingOp>,
}

impl FavoritesState {
    fn apply(&mut self, op: PendingOp) -> bool {
        match op {
            PendingOp::Toggle(path) => !matches!(self.toggle(&path), ToggleOutcome::Ignored),
            PendingOp::Reconcile(allowed) => self.reconcile(&allowed),
        }
    }

    fn toggle(&mut self, path: &str) -> ToggleOutcome {
        if self.favorites.remove(path) {
            return ToggleOutcome::Removed;
        }
        match self.catalog.canonical_path(path) {
            Some(canonical) if canonical == path => {
                self.favorites.insert(path.to_string());
                ToggleOutcome::Added
            }
            _ => ToggleOutcome::Ignored,
        }
    }

    fn reconcile(&mut self, allowed: &BTreeSet<String>) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|path| allowed.contains(path));
        self.favorites.len() != before
    }
}

/// Changes to flush once the state lock is released
struct Flush {
    key: Option<String>,
    snapshot: BTreeSet<String>,
    persist: bool,
    broadcast: bool,
}

/// Owner of the current identity's favorites set.
///
/// All reads go through the query methods and all writes through one path
/// that persists and broadcasts. Nothing is written to storage before the
/// first `hydrate` completes; mutations issued earlier are queued and replayed
/// in order. Storage write failures are logged and swallowed.
pub struct FavoritesStore {
    storage: Arc<dyn KeyValueStorage>,
    channel: Arc<SyncChannel>,
    key_prefix: String,
    state: Mutex<FavoritesState>,
}

impl FavoritesStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, channel: Arc<SyncChannel>) -> Self {
        Self::with_key_prefix(storage, channel, "moduleFavorites")
    }

    pub fn with_key_prefix(storage: Arc<dyn KeyValueStorage>, channel: Arc<SyncChannel>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            channel,
            key_prefix: prefix.into(),
            state: Mutex::new(FavoritesState::default()),
        }
    }

    /// Identity-qualified storage key, e.g. `moduleFavorites_<uuid>`
    pub fn storage_key(&self, identity: &IdentityId) -> String {
        format!("{}_{}", self.key_prefix, identity)
    }

    /// Load and normalize the persisted set for `identity` against `catalog`.
    ///
    /// Unparseable stored data yields an empty set. When the normalized set
    /// differs from what was stored (legacy keys, duplicates, corruption) the
    /// canonical form is written back.
    pub fn hydrate(&self, identity: Option<&IdentityId>, catalog: &Catalog) {
        let key = identity.map(|id| self.storage_key(id));
        let raw = match key.as_deref().map(|k| self.storage.get(k)) {
            Some(Ok(raw)) => raw,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "failed to read stored favorites");
                None
            }
            None => None,
        };
        let parsed = parse_stored(raw.as_deref());
        let loaded = normalize(&parsed, catalog);
        let stale_on_disk = raw.is_some() && raw.as_deref() != Some(serialize(&loaded).as_str());

        let flush = {
            let mut state = self.lock();
            let previous = std::mem::take(&mut state.favorites);

            state.identity = identity.cloned();
            state.catalog = catalog.clone();
            state.favorites = loaded;
            state.hydrated = true;

            let mut replayed = false;
            for op in std::mem::take(&mut state.pending) {
                replayed |= state.apply(op);
            }

            tracing::debug!(
                identity = ?state.identity,
                favorites = state.favorites.len(),
                replayed,
                "favorites hydrated"
            );

            Flush {
                key: key.clone(),
                snapshot: state.favorites.clone(),
                persist: replayed || stale_on_disk,
                broadcast: state.favorites != previous,
            }
        };

        self.flush(flush);
    }

    /// Drop the loaded set and go back to queueing until the next `hydrate`.
    ///
    /// Used when the signed-in identity changed under the store. Nothing is
    /// written; regions still showing the old set are told it is now empty.
    pub fn suspend(&self) {
        let cleared = {
            let mut state = self.lock();
            state.hydrated = false;
            state.identity = None;
            state.pending.clear();
            !std::mem::take(&mut state.favorites).is_empty()
        };
        if cleared {
            self.channel.publish(SyncEvent::FavoritesChanged(Vec::new()));
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.lock().hydrated
    }

    pub fn identity(&self) -> Option<IdentityId> {
        self.lock().identity.clone()
    }

    pub fn is_favorite(&self, path: &str) -> bool {
        self.lock().favorites.contains(path)
    }

    /// Sorted snapshot of the current set
    pub fn favorites(&self) -> Vec<String> {
        self.lock().favorites.iter().cloned().collect()
    }

    /// Favorite modules in catalog order, for the sidebar panel
    pub fn favorite_modules(&self, modules: &[ModuleDescriptor]) -> Vec<ModuleDescriptor> {
        let state = self.lock();
        modules
            .iter()
            .filter(|m| state.favorites.contains(&m.path))
            .cloned()
            .collect()
    }

    /// Flip membership of `path`; two toggles restore the original set exactly
    pub fn toggle_favorite(&self, path: &str) -> ToggleOutcome {
        let (outcome, flush) = {
            let mut state = self.lock();
            if !state.hydrated {
                state.pending.push(PendingOp::Toggle(path.to_string()));
                return ToggleOutcome::Queued;
            }
            let outcome = state.toggle(path);
            let changed = !matches!(outcome, ToggleOutcome::Ignored);
            (outcome, self.flush_for(&state, changed))
        };

        if outcome == ToggleOutcome::Ignored {
            tracing::debug!(path, "toggle ignored; path not in catalog");
        }
        self.flush(flush);
        outcome
    }

    /// Drop favorites outside `allowed_paths`. Returns whether the set changed.
    ///
    /// Redundant calls are no-ops: no write and no broadcast.
    pub fn reconcile(&self, allowed_paths: &BTreeSet<String>) -> bool {
        let flush = {
            let mut state = self.lock();
            if !state.hydrated {
                state.pending.push(PendingOp::Reconcile(allowed_paths.clone()));
                return false;
            }
            let changed = state.reconcile(allowed_paths);
            self.flush_for(&state, changed)
        };

        let changed = flush.persist;
        if changed {
            tracing::info!(remaining = flush.snapshot.len(), "favorites pruned to allowed modules");
        }
        self.flush(flush);
        changed
    }

    /// React to another tab or process writing `key`.
    ///
    /// Re-reads and re-normalizes rather than merging; broadcasts only when the
    /// observable set changed. Returns whether it did.
    pub fn on_external_change(&self, key: &str) -> bool {
        let (identity, catalog) = {
            let state = self.lock();
            let Some(identity) = state.identity.clone() else {
                return false;
            };
            if !state.hydrated || self.storage_key(&identity) != key {
                return false;
            }
            (identity, state.catalog.clone())
        };

        let raw = match self.storage.get(key) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "failed to re-read favorites after external change");
                return false;
            }
        };
        let reloaded = normalize(&parse_stored(raw.as_deref()), &catalog);

        let snapshot = {
            let mut state = self.lock();
            if state.identity.as_ref() != Some(&identity) || state.favorites == reloaded {
                return false;
            }
            state.favorites = reloaded;
            state.favorites.clone()
        };

        tracing::debug!(favorites = snapshot.len(), "favorites reloaded after external change");
        self.channel
            .publish(SyncEvent::FavoritesChanged(snapshot.into_iter().collect()));
        true
    }

    fn flush_for(&self, state: &FavoritesState, changed: bool) -> Flush {
        Flush {
            key: state.identity.as_ref().map(|id| self.storage_key(id)),
            snapshot: if changed { state.favorites.clone() } else { BTreeSet::new() },
            persist: changed,
            broadcast: changed,
        }
    }

    fn flush(&self, flush: Flush) {
        if flush.persist {
            if let Some(key) = flush.key.as_deref() {
                if let Err(err) = self.storage.set(key, &serialize(&flush.snapshot)) {
                    tracing::warn!(error = %err, key, "failed to persist favorites");
                }
            }
        }
        if flush.broadcast {
            self.channel
                .publish(SyncEvent::FavoritesChanged(flush.snapshot.into_iter().collect()));
        }
    }

    fn lock(&self) -> MutexGuard<'_, FavoritesState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for FavoritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FavoritesStore")
            .field("identity", &state.identity)
            .field("favorites", &state.favorites)
            .field("hydrated", &state.hydrated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModuleDescriptor;
    use crate::storage::MemoryStorage;
    use crate::sync::Topic;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "moduleFavorites_U1";

    fn catalog() -> Catalog {
        Catalog::new(vec![
            ModuleDescriptor::new("pdf", "Extrair PDF", "/modulos/pdf"),
            ModuleDescriptor::new("calc", "Calculadora", "/modulos/calc"),
        ])
        .unwrap()
    }

    fn u1() -> IdentityId {
        IdentityId::from("U1")
    }

    fn allowed(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    struct Harness {
        storage: Arc<MemoryStorage>,
        channel: Arc<SyncChannel>,
        store: FavoritesStore,
        broadcasts: Arc<AtomicUsize>,
        _sub: crate::sync::Subscription,
    }

    fn harness(storage: MemoryStorage) -> Harness {
        let storage = Arc::new(storage);
        let channel = SyncChannel::new();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&broadcasts);
        let sub = channel.subscribe(Topic::FavoritesChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let store = FavoritesStore::new(storage.clone(), Arc::clone(&channel));
        Harness {
            storage,
            channel,
            store,
            broadcasts,
            _sub: sub,
        }
    }

    #[test]
    fn suspended_store_queues_until_hydrated_for_the_next_identity() {
        let h = harness(MemoryStorage::new().with_entry(KEY, r#"["/modulos/calc"]"#));
        h.store.hydrate(Some(&u1()), &catalog());
        let writes = h.storage.write_count();

        h.store.suspend();
        assert!(!h.store.is_hydrated());
        assert!(h.store.favorites().is_empty());
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 2);

        assert_eq!(h.store.toggle_favorite("/modulos/pdf"), ToggleOutcome::Queued);
        assert_eq!(h.storage.write_count(), writes);

        let u2 = IdentityId::from("U2");
        h.store.hydrate(Some(&u2), &catalog());
        assert_eq!(h.store.favorites(), vec!["/modulos/pdf".to_string()]);
        assert_eq!(h.storage.get("moduleFavorites_U2").unwrap().as_deref(), Some(r#"["/modulos/pdf"]"#));
        assert_eq!(h.storage.get(KEY).unwrap().as_deref(), Some(r#"["/modulos/calc"]"#));
    }

    #[test]
    fn toggle_twice_restores_original_set() {
        let h = harness(MemoryStorage::new().with_entry(KEY, r#"["/modulos/calc"]"#));
        h.store.hydrate(Some(&u1()), &catalog());
        let before = h.store.favorites();

        assert_eq!(h.store.toggle_favorite("/modulos/pdf"), ToggleOutcome::Added);
        assert_eq!(h.store.toggle_favorite("/modulos/pdf"), ToggleOutcome::Removed);
        assert_eq!(h.store.favorites(), before);

        assert_eq!(h.store.toggle_favorite("/modulos/calc"), ToggleOutcome::Removed);
        assert_eq!(h.store.toggle_favorite("/modulos/calc"), ToggleOutcome::Added);
        assert_eq!(h.store.favorites(), before);
        assert_eq!(h.storage.get(KEY).unwrap().as_deref(), Some(r#"["/modulos/calc"]"#));
    }

    #[test]
    fn each_change_broadcasts_exactly_once() {
        let h = harness(MemoryStorage::new());
        h.store.hydrate(Some(&u1()), &catalog());
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 0);

        h.store.toggle_favorite("/modulos/pdf");
        h.store.toggle_favorite("/modulos/calc");
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 2);
        assert_eq!(h.storage.write_count(), 2);
    }

    #[test]
    fn toggling_unknown_path_is_ignored() {
        let h = harness(MemoryStorage::new());
        h.store.hydrate(Some(&u1()), &catalog());
        assert_eq!(h.store.toggle_favorite("/modulos/ghost"), ToggleOutcome::Ignored);
        assert_eq!(h.store.toggle_favorite("pdf"), ToggleOutcome::Ignored);
        assert!(h.store.favorites().is_empty());
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 0);
        assert_eq!(h.storage.write_count(), 0);
    }

    #[test]
    fn reconcile_prunes_revoked_and_is_quiet_when_redundant() {
        let h = harness(MemoryStorage::new());
        h.store.hydrate(Some(&u1()), &catalog());
        h.store.toggle_favorite("/modulos/pdf");
        h.store.toggle_favorite("/modulos/calc");
        let broadcasts = h.broadcasts.load(Ordering::SeqCst);
        let writes = h.storage.write_count();

        let a = allowed(&["/modulos/pdf"]);
        assert!(h.store.reconcile(&a));
        assert!(h.store.favorites().iter().all(|p| a.contains(p)));

        assert!(!h.store.reconcile(&a));
        assert!(!h.store.reconcile(&a));
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), broadcasts + 1);
        assert_eq!(h.storage.write_count(), writes + 1);
    }

    #[test]
    fn happy_path_then_permission_revoked() {
        let h = harness(MemoryStorage::new());
        h.store.hydrate(Some(&u1()), &catalog());
        h.store.toggle_favorite("/modulos/pdf");

        h.store.reconcile(&allowed(&["/modulos/pdf"]));
        assert!(h.store.is_favorite("/modulos/pdf"));

        h.store.reconcile(&allowed(&[]));
        assert!(!h.store.is_favorite("/modulos/pdf"));
        assert_eq!(h.storage.get(KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn no_writes_before_hydration_and_queued_ops_replay_in_order() {
        let h = harness(MemoryStorage::new().with_entry(KEY, r#"["/modulos/calc"]"#));

        assert_eq!(h.store.toggle_favorite("/modulos/pdf"), ToggleOutcome::Queued);
        assert_eq!(h.store.toggle_favorite("/modulos/calc"), ToggleOutcome::Queued);
        assert!(!h.store.reconcile(&allowed(&["/modulos/pdf", "/modulos/calc"])));
        assert_eq!(h.storage.write_count(), 0);
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 0);
        assert!(!h.store.is_hydrated());

        h.store.hydrate(Some(&u1()), &catalog());
        // stored calc was not overwritten by an empty initial state; the queued
        // toggles ran against the hydrated set
        assert_eq!(h.store.favorites(), vec!["/modulos/pdf".to_string()]);
        assert_eq!(h.storage.write_count(), 1);
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn legacy_storage_is_migrated_on_hydrate() {
        let h = harness(MemoryStorage::new().with_entry(KEY, r#"["pdf", "/modulos/calc", "ghost-module"]"#));
        h.store.hydrate(Some(&u1()), &catalog());

        assert_eq!(h.store.favorites(), vec!["/modulos/calc".to_string(), "/modulos/pdf".to_string()]);
        assert_eq!(h.storage.get(KEY).unwrap().as_deref(), Some(r#"["/modulos/calc","/modulos/pdf"]"#));
    }

    #[test]
    fn corrupted_storage_hydrates_empty() {
        let h = harness(MemoryStorage::new().with_entry(KEY, "{{{ definitely not json"));
        h.store.hydrate(Some(&u1()), &catalog());
        assert!(h.store.is_hydrated());
        assert!(h.store.favorites().is_empty());
        assert_eq!(h.storage.get(KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn write_failures_are_swallowed() {
        let h = harness(MemoryStorage::new());
        h.store.hydrate(Some(&u1()), &catalog());
        h.storage.set_fail_writes(true);

        assert_eq!(h.store.toggle_favorite("/modulos/pdf"), ToggleOutcome::Added);
        assert!(h.store.is_favorite("/modulos/pdf"));
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn storage_is_scoped_per_identity() {
        let h = harness(MemoryStorage::new());
        h.store.hydrate(Some(&u1()), &catalog());
        h.store.toggle_favorite("/modulos/pdf");

        let u2 = IdentityId::from("U2");
        h.store.hydrate(Some(&u2), &catalog());
        assert!(h.store.favorites().is_empty());
        assert_eq!(h.storage.get("moduleFavorites_U2").unwrap(), None);

        h.store.hydrate(Some(&u1()), &catalog());
        assert!(h.store.is_favorite("/modulos/pdf"));
    }

    #[test]
    fn absent_identity_never_persists() {
        let h = harness(MemoryStorage::new());
        h.store.hydrate(None, &catalog());
        assert!(h.store.is_hydrated());
        assert_eq!(h.store.toggle_favorite("/modulos/pdf"), ToggleOutcome::Added);
        assert_eq!(h.storage.write_count(), 0);
    }

    #[test]
    fn external_change_rehydrates_and_broadcasts_once() {
        let h = harness(MemoryStorage::new());
        h.store.hydrate(Some(&u1()), &catalog());

        h.storage.write_external(KEY, r#"["calc"]"#);
        assert!(h.store.on_external_change(KEY));
        assert_eq!(h.store.favorites(), vec!["/modulos/calc".to_string()]);
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 1);

        assert!(!h.store.on_external_change(KEY));
        assert!(!h.store.on_external_change("moduleFavorites_someone-else"));
        assert_eq!(h.broadcasts.load(Ordering::SeqCst), 1);
        assert_eq!(h.channel.subscriber_count(Topic::FavoritesChanged), 1);
    }

    #[test]
    fn favorite_modules_follow_catalog_order() {
        let h = harness(MemoryStorage::new().with_entry(KEY, r#"["/modulos/calc", "/modulos/pdf"]"#));
        let c = catalog();
        h.store.hydrate(Some(&u1()), &c);
        let keys: Vec<_> = h.store.favorite_modules(c.modules()).into_iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["pdf", "calc"]);
    }
}
