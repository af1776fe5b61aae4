//! Per-tenant context resolution for multi-tenant services.
//!
//! This crate turns a tenant id into an immutable, cached [`TenantContext`]
//! (owner, status, limits, organization) and checks that the caller's token
//! belongs to the tenant's organization. Contexts are computed at most once
//! per tenant and check period by [`PeriodicCache`]; the reserved default
//! tenant bypasses both the cache and authorization.
//!
//! # Examples
//!
//! Resolving a tenant for an end-user request (enable `memory-store`):
//! ```no_run
//! use rs_tenant_context::{MapClaims, ResolverBuilder, TenantId};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use rs_tenant_context::MemoryStore;
//! let resolver = ResolverBuilder::new(MemoryStore::new())
//!     .organization_id_claims(["org_id"])
//!     .auth_enabled(true)
//!     .build();
//! let tenant = TenantId::try_from("tenant_1").unwrap();
//! let claims = MapClaims::new("raw.jwt.token").with_claim("org_id", "org_1");
//! let _ = resolver.resolve_request(&tenant, Some(&claims));
//! # }
//! ```
//!
//! Creating a standalone cache:
//! ```no_run
//! use rs_tenant_context::PeriodicCache;
//! use std::time::Duration;
//! let cache: PeriodicCache<String, u64> =
//!     PeriodicCache::new(Duration::from_secs(60)).with_eviction_threshold(1024);
//! # let _ = cache;
//! ```
#![forbid(unsafe_code)]

mod cache;
mod claims;
mod context;
mod error;
mod gate;
mod limits;
mod resolver;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::cache::{DEFAULT_CHECK_PERIOD, PeriodicCache};
pub use crate::claims::{Claims, MapClaims};
pub use crate::context::TenantContext;
pub use crate::error::{Error, Result, SharedStoreError, StoreError};
pub use crate::gate::{AuthorizationGate, Decision};
pub use crate::limits::{DefaultLimitsProvider, LimitsProvider, ResourceType, TenantLimits};
pub use crate::resolver::{Access, ResolverBuilder, ResolverConfig, TenantContextResolver};
pub use crate::store::{MetadataStore, TenantMetadata, TenantResource};
pub use crate::types::{DEFAULT_TENANT_ID, OrganizationId, TenantId, TenantStatus};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
