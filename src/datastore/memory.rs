use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::catalog::{Catalog, ModuleDescriptor};
use crate::datastore::{DataStore, Profile, Role};
use crate::error::{PortalError, PortalResult};
use crate::permissions::{Grant, IdentityId};

#[derive(Debug, Default)]
struct Tables {
    modules: Vec<ModuleDescriptor>,
    grants: Vec<Grant>,
    profiles: Vec<Profile>,
}

/// In-memory `DataStore` for tests and offline runs.
///
/// Catalog and grant fetches can each be made to fail or to stall, to
/// exercise the deny-all fallback, completion order and stale-result handling.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    tables: Mutex<Tables>,
    fail_catalog: AtomicBool,
    catalog_delay_ms: AtomicU64,
    fail_grants: AtomicBool,
    grants_delay_ms: AtomicU64,
}

impl MemoryDataStore {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                modules,
                ..Tables::default()
            }),
            ..Self::default()
        }
    }

    pub fn with_grant(self, grant: Grant) -> Self {
        self.lock().grants.push(grant);
        self
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        self.lock().profiles.push(profile);
        self
    }

    pub fn set_fail_catalog(&self, fail: bool) {
        self.fail_catalog.store(fail, Ordering::SeqCst);
    }

    pub fn set_catalog_delay(&self, delay: Duration) {
        self.catalog_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_fail_grants(&self, fail: bool) {
        self.fail_grants.store(fail, Ordering::SeqCst);
    }

    pub fn set_grants_delay(&self, delay: Duration) {
        self.grants_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_modules(&self, modules: Vec<ModuleDescriptor>) {
        self.lock().modules = modules;
    }

    pub fn grants(&self) -> Vec<Grant> {
        self.lock().grants.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn stall(delay_ms: &AtomicU64) {
    let delay = delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn fetch_catalog(&self) -> PortalResult<Catalog> {
        stall(&self.catalog_delay_ms).await;
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(PortalError::data_store("catalog table unavailable"));
        }
        let modules = self.lock().modules.clone();
        Catalog::new(modules)
    }

    async fn fetch_grants(&self, identity: &IdentityId) -> PortalResult<Vec<Grant>> {
        stall(&self.grants_delay_ms).await;
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(PortalError::data_store("grants table unavailable"));
        }
        Ok(self
            .lock()
            .grants
            .iter()
            .filter(|g| &g.identity_id == identity)
            .cloned()
            .collect())
    }

    async fn fetch_role(&self, identity: &IdentityId) -> PortalResult<Role> {
        self.lock()
            .profiles
            .iter()
            .find(|p| &p.id == identity)
            .map(|p| p.role)
            .ok_or_else(|| PortalError::forbidden(format!("no profile for {}", identity)))
    }

    async fn set_grant(&self, identity: &IdentityId, module_key: &str, active: bool) -> PortalResult<()> {
        let mut tables = self.lock();
        if !tables.modules.iter().any(|m| m.key == module_key) {
            return Err(PortalError::data_store(format!("unknown module '{}'", module_key)));
        }
        tables
            .grants
            .retain(|g| !(&g.identity_id == identity && g.module_key == module_key));
        tables.grants.push(Grant::new(identity.clone(), module_key, active));
        Ok(())
    }

    async fn list_profiles(&self) -> PortalResult<Vec<Profile>> {
        let mut profiles = self.lock().profiles.clone();
        profiles.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(profiles)
    }

    async fn invite_user(&self, email: &str) -> PortalResult<IdentityId> {
        let mut tables = self.lock();
        if tables.profiles.iter().any(|p| p.email.as_deref() == Some(email)) {
            return Err(PortalError::data_store(format!("user {} already registered", email)));
        }
        let id = IdentityId::from(uuid::Uuid::new_v4());
        tables.profiles.push(Profile {
            id: id.clone(),
            email: Some(email.to_string()),
            full_name: None,
            role: Role::User,
        });
        Ok(id)
    }

    async fn delete_user(&self, identity: &IdentityId) -> PortalResult<()> {
        let mut tables = self.lock();
        let before = tables.profiles.len();
        tables.profiles.retain(|p| &p.id != identity);
        if tables.profiles.len() == before {
            return Err(PortalError::data_store(format!("user {} not found", identity)));
        }
        tables.grants.retain(|g| &g.identity_id != identity);
        Ok(())
    }
}
