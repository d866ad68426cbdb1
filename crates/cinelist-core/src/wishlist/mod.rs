//! Saved movies.
//!
//! A single wishlist shared by everyone using this client (it is not keyed
//! by identity). Entries are copies of the movie taken when it was saved.

pub mod entry;
pub mod store;

pub use entry::WishlistEntry;
pub use store::{WishlistChange, WishlistStore};
