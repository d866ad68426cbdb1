use std::future::Future;
use std::sync::Arc;

use crate::api::{ApiResult, CatalogGateway};

/// Checks a candidate API key against the catalog service.
///
/// Implemented by `CatalogGateway`; tests substitute a stub so that the
/// registration flow runs without a network.
pub trait CredentialProbe: Send + Sync {
    /// `Ok(())` only if the service accepted `secret`.
    fn validate_credential(&self, secret: &str) -> impl Future<Output = ApiResult<()>> + Send;
}

impl CredentialProbe for CatalogGateway {
    fn validate_credential(&self, secret: &str) -> impl Future<Output = ApiResult<()>> + Send {
        CatalogGateway::validate_credential(self, secret)
    }
}

impl<T: CredentialProbe> CredentialProbe for Arc<T> {
    fn validate_credential(&self, secret: &str) -> impl Future<Output = ApiResult<()>> + Send {
        (**self).validate_credential(secret)
    }
}
