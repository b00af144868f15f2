// Per-identity favorites: normalization of stored data and the owning store

pub mod normalize;
pub mod store;

pub use normalize::{normalize, parse_stored};
pub use store::{FavoritesStore, ToggleOutcome};
