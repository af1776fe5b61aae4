use crate::error::StoreError;
use crate::limits::ResourceType;
use crate::types::{OrganizationId, TenantId, TenantStatus};
use async_trait::async_trait;

/// Per-tenant resource limit recorded in tenant metadata.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TenantResource {
    /// Resource the limit applies to.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub resource_type: ResourceType,
    /// Limit value as stored upstream.
    pub limit: i64,
}

/// Tenant record held by the metadata store.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TenantMetadata {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Principal that created the tenant.
    pub created_by: String,
    /// Organization owning the tenant.
    pub organization_id: OrganizationId,
    /// Lifecycle status.
    pub status: TenantStatus,
    /// Resource limits overriding the defaults.
    #[cfg_attr(feature = "serde", serde(default))]
    pub resources: Vec<TenantResource>,
}

/// Store interface for tenant metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Returns the metadata of a tenant, or `None` when it does not exist.
    async fn get_tenant(
        &self,
        tenant: &TenantId,
    ) -> std::result::Result<Option<TenantMetadata>, StoreError>;
}
