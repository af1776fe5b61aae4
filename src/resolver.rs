use crate::cache::{DEFAULT_CHECK_PERIOD, PeriodicCache};
use crate::claims::Claims;
use crate::context::TenantContext;
use crate::error::{Error, Result};
use crate::gate::AuthorizationGate;
use crate::limits::{DefaultLimitsProvider, LimitsProvider};
use crate::store::MetadataStore;
use crate::types::TenantId;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// How a resolution was requested.
#[derive(Clone, Copy)]
pub enum Access<'a> {
    /// End-user request; the caller's token claims, when it presented any,
    /// are checked against the tenant's organization.
    Request(Option<&'a dyn Claims>),
    /// Internal or batch work; never authorization checked.
    BatchJob,
}

impl std::fmt::Debug for Access<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(claims) => f
                .debug_struct("Request")
                .field("has_claims", &claims.is_some())
                .finish(),
            Self::BatchJob => f.write_str("BatchJob"),
        }
    }
}

/// Plain configuration values for [`ResolverBuilder`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResolverConfig {
    /// Milliseconds after which a cached context may be recomputed.
    pub cache_check_period_ms: u64,
    /// Claim names holding the caller's organization, in lookup order.
    pub organization_id_claims: Vec<String>,
    /// Whether token based authorization is enforced at all.
    pub auth_enabled: bool,
    /// Whether end-user requests ask for tenant authorization.
    pub multitenancy_authorization: bool,
    /// Cache size above which stale contexts are pruned on insert.
    pub eviction_threshold: Option<usize>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_check_period_ms: DEFAULT_CHECK_PERIOD.as_millis() as u64,
            organization_id_claims: Vec::new(),
            auth_enabled: false,
            multitenancy_authorization: true,
            eviction_threshold: None,
        }
    }
}

/// Resolves tenant ids into cached [`TenantContext`]s and checks that the
/// caller may act on the tenant's organization.
#[derive(Debug)]
pub struct TenantContextResolver<M, L = DefaultLimitsProvider> {
    store: Arc<M>,
    limits: Arc<L>,
    cache: PeriodicCache<TenantId, Arc<TenantContext>>,
    default_context: OnceLock<Arc<TenantContext>>,
    gate: AuthorizationGate,
    auth_enabled: bool,
    multitenancy_authorization: bool,
}

/// Builder for [`TenantContextResolver`].
pub struct ResolverBuilder<M, L = DefaultLimitsProvider> {
    store: M,
    limits: L,
    config: ResolverConfig,
}

impl<M> ResolverBuilder<M, DefaultLimitsProvider> {
    /// Creates a new builder with default configuration.
    pub fn new(store: M) -> Self {
        Self {
            store,
            limits: DefaultLimitsProvider::default(),
            config: ResolverConfig::default(),
        }
    }
}

impl<M, L> ResolverBuilder<M, L> {
    /// Replaces all configuration values.
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the interval after which cached contexts may be recomputed.
    pub fn cache_check_period(mut self, period: Duration) -> Self {
        self.config.cache_check_period_ms = period.as_millis() as u64;
        self
    }

    /// Sets the claim names holding the caller's organization, in lookup order.
    pub fn organization_id_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.organization_id_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    /// Enables or disables token based authorization.
    pub fn auth_enabled(mut self, on: bool) -> Self {
        self.config.auth_enabled = on;
        self
    }

    /// Enables or disables authorization of end-user requests.
    pub fn multitenancy_authorization(mut self, on: bool) -> Self {
        self.config.multitenancy_authorization = on;
        self
    }

    /// Prunes stale contexts once the cache grows past `threshold`.
    pub fn eviction_threshold(mut self, threshold: usize) -> Self {
        self.config.eviction_threshold = Some(threshold);
        self
    }

    /// Sets the limits provider.
    pub fn limits<L2: LimitsProvider>(self, limits: L2) -> ResolverBuilder<M, L2> {
        ResolverBuilder {
            store: self.store,
            limits,
            config: self.config,
        }
    }

    /// Builds the resolver.
    pub fn build(self) -> TenantContextResolver<M, L> {
        let mut cache =
            PeriodicCache::new(Duration::from_millis(self.config.cache_check_period_ms));
        if let Some(threshold) = self.config.eviction_threshold {
            cache = cache.with_eviction_threshold(threshold);
        }

        TenantContextResolver {
            store: Arc::new(self.store),
            limits: Arc::new(self.limits),
            cache,
            default_context: OnceLock::new(),
            gate: AuthorizationGate::new(self.config.organization_id_claims),
            auth_enabled: self.config.auth_enabled,
            multitenancy_authorization: self.config.multitenancy_authorization,
        }
    }
}

impl<M, L> TenantContextResolver<M, L>
where
    M: MetadataStore + 'static,
    L: LimitsProvider + 'static,
{
    /// Resolves the context of `tenant`.
    ///
    /// The default tenant short-circuits to a singleton context and is never
    /// authorization checked. Any other tenant is served from the cache,
    /// loading metadata and limits on a miss, then checked against the
    /// caller's claims when `access` is [`Access::Request`].
    pub async fn resolve(
        &self,
        tenant: &TenantId,
        access: Access<'_>,
    ) -> Result<Arc<TenantContext>> {
        if tenant.is_default() {
            return Ok(self.default_tenant_context());
        }

        let store = Arc::clone(&self.store);
        let limits = Arc::clone(&self.limits);
        let context = self
            .cache
            .compute_if_absent_or_stale(tenant.clone(), move |tenant| {
                Self::load_context(store, limits, tenant)
            })
            .await?;

        if let Access::Request(claims) = access {
            self.gate.authorize(&context, claims, self.auth_enabled)?;
        }
        Ok(context)
    }

    /// Resolves a context for an end-user request carrying `claims`.
    ///
    /// Authorization is requested unless multitenancy authorization is
    /// switched off, and is enforced only when auth is enabled.
    pub async fn resolve_request(
        &self,
        tenant: &TenantId,
        claims: Option<&dyn Claims>,
    ) -> Result<Arc<TenantContext>> {
        let access = if self.multitenancy_authorization {
            Access::Request(claims)
        } else {
            Access::BatchJob
        };
        self.resolve(tenant, access).await
    }

    /// Resolves a context for internal work that has no end-user token.
    pub async fn resolve_batch_job(&self, tenant: &TenantId) -> Result<Arc<TenantContext>> {
        self.resolve(tenant, Access::BatchJob).await
    }

    async fn load_context(
        store: Arc<M>,
        limits: Arc<L>,
        tenant: TenantId,
    ) -> Result<Arc<TenantContext>> {
        tracing::debug!(tenant = %tenant, "loading tenant context");
        let metadata = store
            .get_tenant(&tenant)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::TenantNotFound {
                tenant: tenant.clone(),
            })?;
        let tenant_limits = limits
            .from_tenant_metadata(&metadata)
            .await
            .map_err(|source| Error::LimitsDerivation {
                tenant: tenant.clone(),
                source: Arc::from(source),
            })?;

        Ok(Arc::new(TenantContext::new(
            tenant,
            Some(metadata.created_by),
            tenant_limits,
            metadata.status,
            Some(metadata.organization_id),
        )))
    }
}

impl<M, L> TenantContextResolver<M, L>
where
    L: LimitsProvider,
{
    /// Returns the default tenant context, building it on first use.
    pub fn default_tenant_context(&self) -> Arc<TenantContext> {
        Arc::clone(self.default_context.get_or_init(|| {
            Arc::new(TenantContext::default_tenant(
                self.limits.default_configuration(),
            ))
        }))
    }

    /// Drops the cached context of `tenant`.
    pub fn invalidate(&self, tenant: &TenantId) {
        tracing::debug!(tenant = %tenant, "invalidating tenant context");
        self.cache.remove(tenant);
    }

    /// Drops every cached context. The default tenant context is kept.
    pub fn invalidate_all(&self) {
        tracing::debug!("invalidating all tenant contexts");
        self.cache.clear();
    }

    /// Returns the authorization gate.
    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }
}
