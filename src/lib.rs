pub mod admin;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod datastore;
pub mod documents;
pub mod error;
pub mod favorites;
pub mod permissions;
pub mod portal;
pub mod routing;
pub mod session;
pub mod storage;
pub mod sync;

pub use catalog::{Catalog, ModuleDescriptor};
pub use error::{PortalError, PortalResult};
pub use favorites::{FavoritesStore, ToggleOutcome};
pub use permissions::{AccessState, Grant, IdentityId};
pub use portal::{DashboardStatus, DashboardView, Portal};
pub use session::{Identity, Session};
pub use sync::{SyncChannel, SyncEvent, Topic};
