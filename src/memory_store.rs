use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use async_trait::async_trait;
use crate::store::{MetadataStore, TenantMetadata};
use crate::types::TenantId;

/// In-memory metadata store for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tenants: RwLock<HashMap<TenantId, TenantMetadata>>,
    lookups: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tenant record.
    pub fn put_tenant(&self, metadata: TenantMetadata) {
        let mut guard = self.inner.tenants.write().expect("poisoned lock");
        guard.insert(metadata.tenant_id.clone(), metadata);
    }

    /// Removes a tenant record.
    pub fn remove_tenant(&self, tenant: &TenantId) {
        let mut guard = self.inner.tenants.write().expect("poisoned lock");
        guard.remove(tenant);
    }

    /// Returns how many times [`MetadataStore::get_tenant`] was called.
    pub fn lookups(&self) -> usize {
        self.inner.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get_tenant(
        &self,
        tenant: &TenantId,
    ) -> std::result::Result<Option<TenantMetadata>, crate::StoreError> {
        self.inner.lookups.fetch_add(1, Ordering::SeqCst);
        let guard = self.inner.tenants.read().expect("poisoned lock");
        Ok(guard.get(tenant).cloned())
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use super::*;
    use crate::types::{OrganizationId, TenantStatus};

    #[test]
    fn memory_store_should_support_basic_flow() {
        let store = MemoryStore::new();
        let tenant = TenantId::try_from("tenant_1").unwrap();
        store.put_tenant(TenantMetadata {
            tenant_id: tenant.clone(),
            created_by: "owner_1".to_string(),
            organization_id: OrganizationId::try_from("org_1").unwrap(),
            status: TenantStatus::Ready,
            resources: Vec::new(),
        });

        let found = block_on(store.get_tenant(&tenant)).unwrap();
        assert_eq!(found.map(|m| m.created_by), Some("owner_1".to_string()));

        store.remove_tenant(&tenant);
        assert!(block_on(store.get_tenant(&tenant)).unwrap().is_none());
        assert_eq!(store.lookups(), 2);
    }
}
