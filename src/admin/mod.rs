use serde::Serialize;
use std::sync::Arc;

use crate::catalog::ModuleDescriptor;
use crate::datastore::{DataStore, Profile, Role};
use crate::error::{PortalError, PortalResult};
use crate::permissions::{active_module_keys, IdentityId};
use crate::session::{Identity, Session};

/// One row of the per-user permission matrix on the admin screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModulePermission {
    pub module: ModuleDescriptor,
    pub active: bool,
}

/// User and permission management, restricted to identities whose profile
/// role is `admin`. Any failure while checking the role denies access.
pub struct AdminService {
    data_store: Arc<dyn DataStore>,
    session: Arc<Session>,
}

impl AdminService {
    pub fn new(data_store: Arc<dyn DataStore>, session: Arc<Session>) -> Self {
        Self { data_store, session }
    }

    pub async fn require_admin(&self) -> PortalResult<Identity> {
        let identity = self.session.current().ok_or(PortalError::Unauthenticated)?;
        match self.data_store.fetch_role(&identity.id).await {
            Ok(Role::Admin) => Ok(identity),
            Ok(Role::User) => {
                tracing::warn!(identity = %identity.id, "non-admin attempted admin access");
                Err(PortalError::forbidden("administrator role required"))
            }
            Err(PortalError::Unauthenticated) => Err(PortalError::Unauthenticated),
            Err(err) => {
                tracing::warn!(identity = %identity.id, error = %err, "role check failed; denying admin access");
                Err(PortalError::forbidden("could not verify administrator role"))
            }
        }
    }

    pub async fn list_users(&self) -> PortalResult<Vec<Profile>> {
        self.require_admin().await?;
        self.data_store.list_profiles().await
    }

    /// Every catalog module with whether `identity` currently holds it
    pub async fn user_permissions(&self, identity: &IdentityId) -> PortalResult<Vec<ModulePermission>> {
        self.require_admin().await?;
        let (catalog, grants) = tokio::try_join!(
            self.data_store.fetch_catalog(),
            self.data_store.fetch_grants(identity)
        )?;
        let active = active_module_keys(&grants, identity);
        Ok(catalog
            .modules()
            .iter()
            .map(|m| ModulePermission {
                module: m.clone(),
                active: active.contains(m.key.as_str()),
            })
            .collect())
    }

    pub async fn grant(&self, identity: &IdentityId, module_key: &str) -> PortalResult<()> {
        self.set_grant(identity, module_key, true).await
    }

    pub async fn revoke(&self, identity: &IdentityId, module_key: &str) -> PortalResult<()> {
        self.set_grant(identity, module_key, false).await
    }

    async fn set_grant(&self, identity: &IdentityId, module_key: &str, active: bool) -> PortalResult<()> {
        let admin = self.require_admin().await?;
        let catalog = self.data_store.fetch_catalog().await?;
        if catalog.by_key(module_key).is_none() {
            return Err(PortalError::invalid_input(format!("unknown module '{}'", module_key)));
        }
        self.data_store.set_grant(identity, module_key, active).await?;
        tracing::info!(admin = %admin.id, identity = %identity, module = module_key, active, "permission changed");
        Ok(())
    }

    pub async fn invite(&self, email: &str) -> PortalResult<IdentityId> {
        self.require_admin().await?;
        let email = email.trim();
        let valid = email
            .split_once('@')
            .map(|(user, domain)| !user.is_empty() && domain.contains('.') && !domain.starts_with('.'))
            .unwrap_or(false);
        if !valid {
            return Err(PortalError::invalid_input(format!("invalid email '{}'", email)));
        }
        self.data_store.invite_user(email).await
    }

    pub async fn delete_user(&self, identity: &IdentityId) -> PortalResult<()> {
        let admin = self.require_admin().await?;
        if &admin.id == identity {
            return Err(PortalError::invalid_input("administrators cannot delete their own account"));
        }
        self.data_store.delete_user(identity).await
    }
}
