// Data store seam: catalog, grants, profiles and admin user management
//
// The backend-as-a-service enforces row-level security; this crate only
// reads and writes through it.

pub mod memory;
pub mod rest;

pub use memory::MemoryDataStore;
pub use rest::RestDataStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::PortalResult;
use crate::permissions::{Grant, IdentityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(other)]
    User,
}

/// Row of the profiles table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: IdentityId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Full module catalog, in display order
    async fn fetch_catalog(&self) -> PortalResult<Catalog>;

    /// Every grant row for one identity, active or not.
    ///
    /// Rows are not pre-filtered; the resolver decides what duplicate rows mean.
    async fn fetch_grants(&self, identity: &IdentityId) -> PortalResult<Vec<Grant>>;

    async fn fetch_role(&self, identity: &IdentityId) -> PortalResult<Role>;

    /// Create or update the (identity, module) grant
    async fn set_grant(&self, identity: &IdentityId, module_key: &str, active: bool) -> PortalResult<()>;

    async fn list_profiles(&self) -> PortalResult<Vec<Profile>>;

    /// Send an invitation and return the new identity's id
    async fn invite_user(&self, email: &str) -> PortalResult<IdentityId>;

    async fn delete_user(&self, identity: &IdentityId) -> PortalResult<()>;
}
