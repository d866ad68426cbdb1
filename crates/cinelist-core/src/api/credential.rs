//! Credential resolution for outgoing catalog requests.

use std::sync::Arc;

/// Supplies the credential of whoever is currently logged in.
///
/// Queried once per request; implementations must return the live value,
/// not one captured when the gateway was built.
pub trait CredentialSource: Send + Sync {
    fn active_credential(&self) -> Option<String>;
}

/// Source for a gateway used without any session.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

impl CredentialSource for NoSession {
    fn active_credential(&self) -> Option<String> {
        None
    }
}

/// Picks the credential for one request: an explicit override, else the
/// active session's, else the configured fallback.
#[derive(Clone)]
pub struct CredentialResolver {
    source: Arc<dyn CredentialSource>,
    fallback: Option<String>,
}

impl CredentialResolver {
    pub fn new(source: Arc<dyn CredentialSource>, fallback: Option<String>) -> Self {
        Self {
            source,
            fallback: fallback.filter(|k| !k.is_empty()),
        }
    }

    pub fn resolve(&self, credential_override: Option<&str>) -> Option<String> {
        if let Some(secret) = credential_override {
            return Some(secret.to_string());
        }
        self.source
            .active_credential()
            .filter(|k| !k.is_empty())
            .or_else(|| self.fallback.clone())
    }
}
