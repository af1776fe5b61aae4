use crate::types::TenantId;
use std::sync::Arc;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Store error shared between callers awaiting the same computation.
pub type SharedStoreError = Arc<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Errors are cheap to clone so a failed in-flight computation can be handed
/// to every caller that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The metadata store has no record for the tenant.
    #[error("tenant {tenant} not found")]
    TenantNotFound { tenant: TenantId },
    /// Limits configuration could not be derived from tenant metadata.
    #[error("failed to derive limits configuration for tenant {tenant}: {source}")]
    LimitsDerivation {
        tenant: TenantId,
        #[source]
        source: SharedStoreError,
    },
    /// The caller may not act on behalf of the tenant's organization.
    #[error("tenant {tenant} not authorized")]
    TenantNotAuthorized { tenant: TenantId },
    /// Failure of a computation started by another caller.
    #[error(transparent)]
    CacheComputation(Box<Error>),
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] SharedStoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
}

impl Error {
    /// Returns the underlying error, looking through [`Error::CacheComputation`].
    pub fn root(&self) -> &Error {
        match self {
            Self::CacheComputation(inner) => inner.root(),
            other => other,
        }
    }

    /// Returns whether the tenant does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::TenantNotFound { .. })
    }

    /// Returns whether the caller was denied access to the tenant.
    pub fn is_not_authorized(&self) -> bool {
        matches!(self.root(), Self::TenantNotAuthorized { .. })
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(Arc::from(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_should_look_through_cache_computation() {
        let tenant = TenantId::try_from("tenant_1").unwrap();
        let err = Error::CacheComputation(Box::new(Error::TenantNotFound {
            tenant: tenant.clone(),
        }));

        assert!(err.is_not_found());
        assert!(!err.is_not_authorized());
        assert_eq!(err.to_string(), "tenant tenant_1 not found");
    }

    #[test]
    fn store_error_should_keep_message() {
        let err = Error::from(StoreError::from("connection refused"));
        assert_eq!(err.to_string(), "store error: connection refused");
    }
}
