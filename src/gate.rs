use crate::claims::Claims;
use crate::context::TenantContext;
use crate::error::{Error, Result};

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Access is granted.
    Allow,
    /// Access is denied.
    Deny,
}

/// Decides whether a caller may act on a tenant, based on the organization
/// claim in the caller's token.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGate {
    organization_id_claims: Vec<String>,
}

impl AuthorizationGate {
    /// Creates a gate that reads the accessed organization from the first
    /// present claim among `organization_id_claims`, in order.
    pub fn new<I, S>(organization_id_claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            organization_id_claims: organization_id_claims.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the configured organization claim names.
    pub fn organization_id_claims(&self) -> &[String] {
        &self.organization_id_claims
    }

    /// Decides access of the caller described by `claims` to `context`.
    ///
    /// Everything is allowed when `auth_enabled` is false. Callers without a
    /// token are allowed too, since some endpoints permit anonymous access.
    pub fn decide(
        &self,
        context: &TenantContext,
        claims: Option<&dyn Claims>,
        auth_enabled: bool,
    ) -> Decision {
        if !auth_enabled {
            return Decision::Allow;
        }
        let Some(claims) = claims.filter(|claims| has_raw_token(*claims)) else {
            tracing::debug!(
                tenant = %context.tenant_id(),
                "tenant access attempted without token, allowing because some endpoints allow anonymous access"
            );
            return Decision::Allow;
        };

        let Some(accessed) = self.accessed_organization(claims) else {
            return Decision::Deny;
        };
        match context.organization_id() {
            None => Decision::Allow,
            Some(organization) if organization.as_str() == accessed => Decision::Allow,
            Some(_) => Decision::Deny,
        }
    }

    /// Fails with [`Error::TenantNotAuthorized`] unless [`Self::decide`] allows.
    pub fn authorize(
        &self,
        context: &TenantContext,
        claims: Option<&dyn Claims>,
        auth_enabled: bool,
    ) -> Result<()> {
        match self.decide(context, claims, auth_enabled) {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                tracing::warn!(tenant = %context.tenant_id(), "user not authorized to access tenant");
                Err(Error::TenantNotAuthorized {
                    tenant: context.tenant_id().clone(),
                })
            }
        }
    }

    fn accessed_organization(&self, claims: &dyn Claims) -> Option<String> {
        self.organization_id_claims
            .iter()
            .find_map(|name| claims.claim(name).filter(|value| !value.is_empty()))
    }
}

fn has_raw_token(claims: &dyn Claims) -> bool {
    claims.raw_token().is_some_and(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::MapClaims;
    use crate::limits::TenantLimits;
    use crate::types::{OrganizationId, TenantId, TenantStatus};

    fn context(organization: &str) -> TenantContext {
        TenantContext::new(
            TenantId::try_from("tenant_1").unwrap(),
            Some("owner_1".to_string()),
            TenantLimits::default(),
            TenantStatus::Ready,
            Some(OrganizationId::try_from(organization).unwrap()),
        )
    }

    #[test]
    fn disabled_auth_should_allow_any_caller() {
        let gate = AuthorizationGate::new(["org_id"]);
        let claims = MapClaims::new("token").with_claim("org_id", "other");

        assert_eq!(gate.decide(&context("org_a"), Some(&claims), false), Decision::Allow);
        assert_eq!(gate.decide(&context("org_a"), None, false), Decision::Allow);
    }

    #[test]
    fn missing_token_should_allow_anonymous_access() {
        let gate = AuthorizationGate::new(["org_id"]);
        let no_raw = MapClaims::without_token().with_claim("org_id", "other");
        let empty_raw = MapClaims::new("").with_claim("org_id", "other");

        assert_eq!(gate.decide(&context("org_a"), None, true), Decision::Allow);
        assert_eq!(gate.decide(&context("org_a"), Some(&no_raw), true), Decision::Allow);
        assert_eq!(gate.decide(&context("org_a"), Some(&empty_raw), true), Decision::Allow);
    }

    #[test]
    fn matching_organization_should_allow() {
        let gate = AuthorizationGate::new(["org_id"]);
        let claims = MapClaims::new("token").with_claim("org_id", "org_a");

        assert!(gate.authorize(&context("org_a"), Some(&claims), true).is_ok());
    }

    #[test]
    fn mismatching_organization_should_deny() {
        let gate = AuthorizationGate::new(["org_id"]);
        let claims = MapClaims::new("token").with_claim("org_id", "org_a");

        let err = gate
            .authorize(&context("org_b"), Some(&claims), true)
            .expect_err("must deny");
        assert!(matches!(err, Error::TenantNotAuthorized { .. }));
    }

    #[test]
    fn missing_organization_claim_should_deny() {
        let gate = AuthorizationGate::new(["org_id"]);
        let claims = MapClaims::new("token").with_claim("sub", "user_1");

        assert_eq!(gate.decide(&context("org_a"), Some(&claims), true), Decision::Deny);
        assert_eq!(
            AuthorizationGate::default().decide(&context("org_a"), Some(&claims), true),
            Decision::Deny
        );
    }

    #[test]
    fn first_present_claim_should_win() {
        let gate = AuthorizationGate::new(["org_a", "org_b"]);
        let only_second = MapClaims::new("token").with_claim("org_b", "X");
        let both = MapClaims::new("token")
            .with_claim("org_a", "Y")
            .with_claim("org_b", "X");
        let empty_first = MapClaims::new("token")
            .with_claim("org_a", "")
            .with_claim("org_b", "X");

        assert_eq!(gate.decide(&context("X"), Some(&only_second), true), Decision::Allow);
        assert_eq!(gate.decide(&context("X"), Some(&both), true), Decision::Deny);
        assert_eq!(gate.decide(&context("X"), Some(&empty_first), true), Decision::Allow);
    }

    #[test]
    fn context_without_organization_should_allow_any_claim() {
        let gate = AuthorizationGate::new(["org_id"]);
        let claims = MapClaims::new("token").with_claim("org_id", "org_a");
        let default = TenantContext::default_tenant(TenantLimits::default());

        assert_eq!(gate.decide(&default, Some(&claims), true), Decision::Allow);
    }
}
