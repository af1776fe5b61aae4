use crate::error::StoreError;
use crate::store::TenantMetadata;
use async_trait::async_trait;
use std::fmt;

/// Kind of resource a tenant limit applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ResourceType {
    MaxTotalSchemasCount,
    MaxSchemaSizeBytes,
    MaxArtifactsCount,
    MaxVersionsPerArtifactCount,
    MaxArtifactPropertiesCount,
    MaxPropertyKeySizeBytes,
    MaxPropertyValueSizeBytes,
    MaxArtifactLabelsCount,
    MaxLabelSizeBytes,
    MaxArtifactNameLengthChars,
    MaxArtifactDescriptionLengthChars,
    MaxRequestsPerSecondCount,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Quota settings attached to a tenant. `None` means unlimited.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TenantLimits {
    pub max_total_schemas_count: Option<u64>,
    pub max_schema_size_bytes: Option<u64>,
    pub max_artifacts_count: Option<u64>,
    pub max_versions_per_artifact_count: Option<u64>,
    pub max_artifact_properties_count: Option<u64>,
    pub max_property_key_size_bytes: Option<u64>,
    pub max_property_value_size_bytes: Option<u64>,
    pub max_artifact_labels_count: Option<u64>,
    pub max_label_size_bytes: Option<u64>,
    pub max_name_length_chars: Option<u64>,
    pub max_description_length_chars: Option<u64>,
    pub max_requests_per_second_count: Option<u64>,
}

impl TenantLimits {
    /// Sets the limit for a resource type.
    pub fn set(&mut self, resource: ResourceType, limit: u64) {
        *self.slot_mut(resource) = Some(limit);
    }

    /// Returns the limit for a resource type.
    pub fn get(&self, resource: ResourceType) -> Option<u64> {
        match resource {
            ResourceType::MaxTotalSchemasCount => self.max_total_schemas_count,
            ResourceType::MaxSchemaSizeBytes => self.max_schema_size_bytes,
            ResourceType::MaxArtifactsCount => self.max_artifacts_count,
            ResourceType::MaxVersionsPerArtifactCount => self.max_versions_per_artifact_count,
            ResourceType::MaxArtifactPropertiesCount => self.max_artifact_properties_count,
            ResourceType::MaxPropertyKeySizeBytes => self.max_property_key_size_bytes,
            ResourceType::MaxPropertyValueSizeBytes => self.max_property_value_size_bytes,
            ResourceType::MaxArtifactLabelsCount => self.max_artifact_labels_count,
            ResourceType::MaxLabelSizeBytes => self.max_label_size_bytes,
            ResourceType::MaxArtifactNameLengthChars => self.max_name_length_chars,
            ResourceType::MaxArtifactDescriptionLengthChars => self.max_description_length_chars,
            ResourceType::MaxRequestsPerSecondCount => self.max_requests_per_second_count,
        }
    }

    fn slot_mut(&mut self, resource: ResourceType) -> &mut Option<u64> {
        match resource {
            ResourceType::MaxTotalSchemasCount => &mut self.max_total_schemas_count,
            ResourceType::MaxSchemaSizeBytes => &mut self.max_schema_size_bytes,
            ResourceType::MaxArtifactsCount => &mut self.max_artifacts_count,
            ResourceType::MaxVersionsPerArtifactCount => &mut self.max_versions_per_artifact_count,
            ResourceType::MaxArtifactPropertiesCount => &mut self.max_artifact_properties_count,
            ResourceType::MaxPropertyKeySizeBytes => &mut self.max_property_key_size_bytes,
            ResourceType::MaxPropertyValueSizeBytes => &mut self.max_property_value_size_bytes,
            ResourceType::MaxArtifactLabelsCount => &mut self.max_artifact_labels_count,
            ResourceType::MaxLabelSizeBytes => &mut self.max_label_size_bytes,
            ResourceType::MaxArtifactNameLengthChars => &mut self.max_name_length_chars,
            ResourceType::MaxArtifactDescriptionLengthChars => {
                &mut self.max_description_length_chars
            }
            ResourceType::MaxRequestsPerSecondCount => &mut self.max_requests_per_second_count,
        }
    }
}

/// Derives limits configuration for tenants.
#[async_trait]
pub trait LimitsProvider: Send + Sync {
    /// Derives the limits of a tenant from its metadata.
    async fn from_tenant_metadata(
        &self,
        metadata: &TenantMetadata,
    ) -> std::result::Result<TenantLimits, StoreError>;

    /// Returns the limits of the default tenant.
    ///
    /// Must be deterministic; it backs a lazily built singleton.
    fn default_configuration(&self) -> TenantLimits;
}

/// Limits provider that overlays per-tenant resources on a fixed default.
#[derive(Debug, Default, Clone)]
pub struct DefaultLimitsProvider {
    defaults: TenantLimits,
}

impl DefaultLimitsProvider {
    /// Creates a provider with the given default limits.
    pub fn new(defaults: TenantLimits) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl LimitsProvider for DefaultLimitsProvider {
    async fn from_tenant_metadata(
        &self,
        metadata: &TenantMetadata,
    ) -> std::result::Result<TenantLimits, StoreError> {
        let mut limits = self.defaults.clone();
        for resource in &metadata.resources {
            let limit = u64::try_from(resource.limit).map_err(|_| {
                format!(
                    "negative limit {} for {} on tenant {}",
                    resource.limit, resource.resource_type, metadata.tenant_id
                )
            })?;
            limits.set(resource.resource_type, limit);
        }
        Ok(limits)
    }

    fn default_configuration(&self) -> TenantLimits {
        self.defaults.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TenantResource;
    use crate::types::{OrganizationId, TenantId, TenantStatus};
    use futures::executor::block_on;

    fn metadata(resources: Vec<TenantResource>) -> TenantMetadata {
        TenantMetadata {
            tenant_id: TenantId::try_from("tenant_1").unwrap(),
            created_by: "owner_1".to_string(),
            organization_id: OrganizationId::try_from("org_1").unwrap(),
            status: TenantStatus::Ready,
            resources,
        }
    }

    #[test]
    fn tenant_resources_should_override_defaults() {
        let mut defaults = TenantLimits::default();
        defaults.set(ResourceType::MaxArtifactsCount, 10);
        defaults.set(ResourceType::MaxRequestsPerSecondCount, 5);
        let provider = DefaultLimitsProvider::new(defaults);

        let limits = block_on(provider.from_tenant_metadata(&metadata(vec![TenantResource {
            resource_type: ResourceType::MaxArtifactsCount,
            limit: 100,
        }])))
        .unwrap();

        assert_eq!(limits.max_artifacts_count, Some(100));
        assert_eq!(limits.max_requests_per_second_count, Some(5));
        assert_eq!(limits.get(ResourceType::MaxLabelSizeBytes), None);
    }

    #[test]
    fn negative_limit_should_fail() {
        let provider = DefaultLimitsProvider::default();

        let err = block_on(provider.from_tenant_metadata(&metadata(vec![TenantResource {
            resource_type: ResourceType::MaxSchemaSizeBytes,
            limit: -1,
        }])))
        .expect_err("must reject");

        assert!(err.to_string().contains("MaxSchemaSizeBytes"));
    }
}
