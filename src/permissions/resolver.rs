use std::collections::{BTreeSet, HashSet};

use crate::catalog::{Catalog, ModuleDescriptor};
use crate::error::PortalError;
use crate::permissions::grant::{Grant, IdentityId};

/// Outcome of resolving an identity's modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No identity; the caller redirects to the login entry point
    Unauthenticated,
    Allowed(Vec<ModuleDescriptor>),
}

impl Resolution {
    pub fn modules(&self) -> &[ModuleDescriptor] {
        match self {
            Resolution::Unauthenticated => &[],
            Resolution::Allowed(modules) => modules,
        }
    }

    pub fn into_modules(self) -> Vec<ModuleDescriptor> {
        match self {
            Resolution::Unauthenticated => Vec::new(),
            Resolution::Allowed(modules) => modules,
        }
    }
}

/// Module keys the identity holds an active grant for.
///
/// When the store returns several rows for the same module, an inactive row
/// wins over an active one.
pub fn active_module_keys<'a>(grants: &'a [Grant], identity: &IdentityId) -> HashSet<&'a str> {
    let mut active = HashSet::new();
    let mut revoked = HashSet::new();

    for grant in grants.iter().filter(|g| &g.identity_id == identity) {
        if grant.active {
            active.insert(grant.module_key.as_str());
        } else {
            revoked.insert(grant.module_key.as_str());
        }
    }

    active.retain(|key| !revoked.contains(key));
    active
}

/// Compute the modules `identity` may see.
///
/// Pure function of its inputs. Result order follows the catalog, and an
/// identity with no matching grants gets an empty list rather than an error.
pub fn resolve(catalog: &Catalog, grants: &[Grant], identity: Option<&IdentityId>) -> Resolution {
    let Some(identity) = identity else {
        return Resolution::Unauthenticated;
    };

    let keys = active_module_keys(grants, identity);
    let modules = catalog
        .modules()
        .iter()
        .filter(|m| keys.contains(m.key.as_str()))
        .cloned()
        .collect();

    Resolution::Allowed(modules)
}

/// What a dashboard region should render for the current identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessState {
    /// Catalog or grants still outstanding
    Loading,
    Unauthenticated,
    /// Resolved; an empty list is the "no modules available" state
    Ready(Vec<ModuleDescriptor>),
    /// Fetching failed; access is closed until a retry succeeds
    Failed { message: String, retryable: bool },
}

impl AccessState {
    /// Fold the two independent fetch results into one state.
    ///
    /// Any fetch failure resolves to `Failed`, which exposes zero modules.
    pub fn from_fetches(
        catalog: Result<&Catalog, &PortalError>,
        grants: Result<&[Grant], &PortalError>,
        identity: Option<&IdentityId>,
    ) -> Self {
        if identity.is_none() {
            return AccessState::Unauthenticated;
        }
        match (catalog, grants) {
            (Err(PortalError::Unauthenticated), _) | (_, Err(PortalError::Unauthenticated)) => {
                AccessState::Unauthenticated
            }
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(error = %err, "permission fetch failed; denying all modules");
                AccessState::Failed {
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                }
            }
            (Ok(catalog), Ok(grants)) => match resolve(catalog, grants, identity) {
                Resolution::Unauthenticated => AccessState::Unauthenticated,
                Resolution::Allowed(modules) => AccessState::Ready(modules),
            },
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AccessState::Loading)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AccessState::Ready(modules) if modules.is_empty())
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        match self {
            AccessState::Ready(modules) => modules,
            _ => &[],
        }
    }

    pub fn allowed_paths(&self) -> BTreeSet<String> {
        self.modules().iter().map(|m| m.path.clone()).collect()
    }

    pub fn can_access(&self, module_key: &str) -> bool {
        self.modules().iter().any(|m| m.key == module_key)
    }
}
