// Client-local key/value storage (the browser's localStorage, or a JSON file for the CLI)

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::PortalResult;

/// String-keyed, string-valued store scoped to the device, not the account.
///
/// Keys written by the portal are always qualified by identity.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> PortalResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> PortalResult<()>;

    fn remove(&self, key: &str) -> PortalResult<()>;
}
