//! Authentication module: registered users and the active session.
//!
//! This module provides:
//! - `CredentialStore`: local registry of users, keyed by identity
//! - `SessionManager`: registration (with a remote check of the key),
//!   login, and logout
//! - `SessionSignal` / `SessionView`: the live session state and its
//!   read-only handle, consumed by the catalog gateway and the route guard
//!
//! A user's "password" is their catalog API key. Registration only stores a
//! key the catalog service has accepted.

pub mod credentials;
pub mod error;
pub mod probe;
pub mod session;

pub use credentials::{CredentialStore, UserRecord};
pub use error::AuthError;
pub use probe::CredentialProbe;
pub use session::{SessionManager, SessionPhase, SessionSignal, SessionView};
