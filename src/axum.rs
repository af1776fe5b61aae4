//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::claims::Claims;
use crate::context::TenantContext;
use crate::error::Error;
use crate::limits::LimitsProvider;
use crate::resolver::TenantContextResolver;
use crate::store::MetadataStore;
use crate::types::TenantId;

use ::axum::body::Body;
use ::axum::extract::FromRequestParts;
use ::axum::http::request::Parts;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::http::HeaderName;
use ::tower::{Layer, Service};

/// Default header carrying the tenant id.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Token claims of the current request, stored in request extensions.
#[derive(Clone)]
pub struct RequestClaims(Arc<dyn Claims>);

impl RequestClaims {
    /// Wraps claims for insertion into request extensions.
    pub fn new(claims: impl Claims + 'static) -> Self {
        Self(Arc::new(claims))
    }

    /// Returns the wrapped claims.
    pub fn claims(&self) -> &dyn Claims {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for RequestClaims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClaims")
            .field("has_raw_token", &self.0.raw_token().is_some())
            .finish()
    }
}

/// Extractor for the tenant context resolved by [`TenantContextLayer`].
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Arc<TenantContext>);

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<TenantContext>>()
            .cloned()
            .map(Self)
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "missing tenant context"))
    }
}

/// Maps a resolution error to an HTTP status.
pub fn status_for(error: &Error) -> StatusCode {
    match error.root() {
        Error::TenantNotFound { .. } => StatusCode::NOT_FOUND,
        Error::TenantNotAuthorized { .. } => StatusCode::FORBIDDEN,
        Error::InvalidId(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Middleware layer that resolves the request's tenant context.
///
/// The tenant id is read from a header; requests without it run in the
/// default tenant. Claims are taken from [`RequestClaims`] in the request
/// extensions, and the resolved context is inserted as `Arc<TenantContext>`.
#[derive(Debug)]
pub struct TenantContextLayer<M, L> {
    resolver: Arc<TenantContextResolver<M, L>>,
    header: HeaderName,
}

impl<M, L> Clone for TenantContextLayer<M, L> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            header: self.header.clone(),
        }
    }
}

impl<M, L> TenantContextLayer<M, L> {
    /// Creates a new layer reading [`TENANT_ID_HEADER`].
    pub fn new(resolver: Arc<TenantContextResolver<M, L>>) -> Self {
        Self {
            resolver,
            header: HeaderName::from_static(TENANT_ID_HEADER),
        }
    }

    /// Reads the tenant id from `header` instead.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }
}

impl<M, L, Inner> Layer<Inner> for TenantContextLayer<M, L> {
    type Service = TenantContextService<Inner, M, L>;

    fn layer(&self, inner: Inner) -> Self::Service {
        TenantContextService {
            inner,
            resolver: self.resolver.clone(),
            header: self.header.clone(),
        }
    }
}

/// Middleware service that resolves the tenant context.
#[derive(Debug)]
pub struct TenantContextService<Inner, M, L> {
    inner: Inner,
    resolver: Arc<TenantContextResolver<M, L>>,
    header: HeaderName,
}

impl<Inner: Clone, M, L> Clone for TenantContextService<Inner, M, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            resolver: self.resolver.clone(),
            header: self.header.clone(),
        }
    }
}

impl<Inner, M, L> Service<Request<Body>> for TenantContextService<Inner, M, L>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    M: MetadataStore + 'static,
    L: LimitsProvider + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let resolver = self.resolver.clone();
        let tenant = tenant_from_request(&req, &self.header);
        let claims = req.extensions().get::<RequestClaims>().cloned();

        Box::pin(async move {
            let tenant = match tenant {
                Ok(tenant) => tenant,
                Err(err) => return Ok((status_for(&err), err.to_string()).into_response()),
            };

            let resolved = resolver
                .resolve_request(&tenant, claims.as_ref().map(RequestClaims::claims))
                .await;
            match resolved {
                Ok(context) => {
                    req.extensions_mut().insert(context);
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Err(err) => {
                    let status = status_for(&err);
                    let message = match status {
                        StatusCode::INTERNAL_SERVER_ERROR => "tenant resolution error".to_string(),
                        _ => err.to_string(),
                    };
                    Ok((status, message).into_response())
                }
            }
        })
    }
}

fn tenant_from_request(req: &Request<Body>, header: &HeaderName) -> crate::Result<TenantId> {
    let Some(value) = req.headers().get(header) else {
        return Ok(TenantId::default_tenant());
    };
    let value = value
        .to_str()
        .map_err(|_| Error::InvalidId(format!("{header} header is not valid text")))?;
    TenantId::new(value)
}

#[cfg(feature = "axum-jwt")]
pub mod jwt {
    use std::fmt;
    use std::future::poll_fn;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde_json::{Map, Value};
    use thiserror::Error;

    use super::RequestClaims;
    use crate::claims::Claims;

    use ::axum::body::Body;
    use ::axum::http::header::AUTHORIZATION;
    use ::axum::http::{HeaderMap, Request, StatusCode};
    use ::axum::response::{IntoResponse, Response};
    use ::tower::{Layer, Service};

    /// Errors returned by JWT helpers.
    #[derive(Debug, Error)]
    pub enum AuthError {
        /// Authorization header format is invalid.
        #[error("invalid authorization header")]
        InvalidAuthorization,
        /// JWT validation error.
        #[error("invalid token")]
        InvalidToken,
    }

    /// Rejection response for token errors.
    #[derive(Debug)]
    pub struct AuthRejection {
        status: StatusCode,
        message: String,
    }

    impl From<AuthError> for AuthRejection {
        fn from(err: AuthError) -> Self {
            Self {
                status: StatusCode::UNAUTHORIZED,
                message: err.to_string(),
            }
        }
    }

    impl IntoResponse for AuthRejection {
        fn into_response(self) -> Response {
            (self.status, self.message).into_response()
        }
    }

    /// Claims of a decoded bearer token.
    #[derive(Debug, Clone)]
    pub struct TokenClaims {
        raw: String,
        claims: Map<String, Value>,
    }

    impl TokenClaims {
        /// Creates claims from a raw token and its decoded payload.
        pub fn new(raw: String, claims: Map<String, Value>) -> Self {
            Self { raw, claims }
        }
    }

    impl Claims for TokenClaims {
        fn raw_token(&self) -> Option<&str> {
            Some(&self.raw)
        }

        fn claim(&self, name: &str) -> Option<String> {
            match self.claims.get(name)? {
                Value::String(value) => Some(value.clone()),
                Value::Number(value) => Some(value.to_string()),
                _ => None,
            }
        }
    }

    /// JWT decoding settings.
    #[derive(Clone)]
    pub struct JwtClaimsState {
        decoding_key: Arc<DecodingKey>,
        validation: Validation,
    }

    impl fmt::Debug for JwtClaimsState {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("JwtClaimsState")
                .field("decoding_key", &"<redacted>")
                .field("validation", &self.validation)
                .finish()
        }
    }

    impl JwtClaimsState {
        /// Creates a new JWT state.
        pub fn new(decoding_key: DecodingKey, validation: Validation) -> Self {
            Self {
                decoding_key: Arc::new(decoding_key),
                validation,
            }
        }

        /// Decodes the bearer token of `headers`. Returns `None` when the
        /// request carries no authorization header.
        pub fn decode_from_headers(
            &self,
            headers: &HeaderMap,
        ) -> Result<Option<TokenClaims>, AuthError> {
            let Some(token) = bearer_token(headers)? else {
                return Ok(None);
            };
            let data = decode::<Map<String, Value>>(&token, &self.decoding_key, &self.validation)
                .map_err(|_| AuthError::InvalidToken)?;
            Ok(Some(TokenClaims::new(token, data.claims)))
        }
    }

    /// Middleware layer that decodes a bearer token and inserts
    /// [`RequestClaims`] into request extensions.
    ///
    /// Requests without an authorization header pass through without claims.
    #[derive(Debug, Clone)]
    pub struct JwtClaimsLayer {
        state: Arc<JwtClaimsState>,
    }

    impl JwtClaimsLayer {
        /// Creates a new JWT layer.
        pub fn new(state: JwtClaimsState) -> Self {
            Self {
                state: Arc::new(state),
            }
        }
    }

    impl<S> Layer<S> for JwtClaimsLayer {
        type Service = JwtClaimsService<S>;

        fn layer(&self, inner: S) -> Self::Service {
            JwtClaimsService {
                inner,
                state: self.state.clone(),
            }
        }
    }

    /// Middleware service that decodes JWT claims.
    #[derive(Debug, Clone)]
    pub struct JwtClaimsService<S> {
        inner: S,
        state: Arc<JwtClaimsState>,
    }

    impl<S> Service<Request<Body>> for JwtClaimsService<S>
    where
        S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        type Response = Response;
        type Error = S::Error;
        type Future =
            Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, mut req: Request<Body>) -> Self::Future {
            let decoded = self.state.decode_from_headers(req.headers());
            let mut inner = self.inner.clone();

            Box::pin(async move {
                match decoded {
                    Ok(claims) => {
                        if let Some(claims) = claims {
                            req.extensions_mut().insert(RequestClaims::new(claims));
                        }
                        poll_fn(|cx| inner.poll_ready(cx)).await?;
                        inner.call(req).await
                    }
                    Err(err) => Ok(AuthRejection::from(err).into_response()),
                }
            })
        }
    }

    fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidAuthorization)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthorization)?;
        if token.is_empty() {
            return Err(AuthError::InvalidAuthorization);
        }
        Ok(Some(token.to_string()))
    }

}
