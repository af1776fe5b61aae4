use crate::limits::TenantLimits;
use crate::types::{OrganizationId, TenantId, TenantStatus};

/// Immutable, fully resolved state of a tenant.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TenantContext {
    tenant_id: TenantId,
    owner_id: Option<String>,
    limits: TenantLimits,
    status: TenantStatus,
    organization_id: Option<OrganizationId>,
}

impl TenantContext {
    /// Creates a context from its parts.
    pub fn new(
        tenant_id: TenantId,
        owner_id: Option<String>,
        limits: TenantLimits,
        status: TenantStatus,
        organization_id: Option<OrganizationId>,
    ) -> Self {
        Self {
            tenant_id,
            owner_id,
            limits,
            status,
            organization_id,
        }
    }

    /// Creates the default tenant context: ready, no owner, no organization.
    pub(crate) fn default_tenant(limits: TenantLimits) -> Self {
        Self::new(
            TenantId::default_tenant(),
            None,
            limits,
            TenantStatus::Ready,
            None,
        )
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn limits(&self) -> &TenantLimits {
        &self.limits
    }

    pub fn status(&self) -> TenantStatus {
        self.status
    }

    pub fn organization_id(&self) -> Option<&OrganizationId> {
        self.organization_id.as_ref()
    }

    /// Returns whether the tenant is usable.
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    /// Returns whether this is the default tenant context.
    pub fn is_default(&self) -> bool {
        self.tenant_id.is_default()
    }
}
