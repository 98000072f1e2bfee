use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use common_auth::{AuthContext, JwtVerifier};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

use crate::roles::Role;

/// Carries everything a tenant-scoped repository call needs: which tenant it
/// may touch, who is asking, and what they are allowed to do.
///
/// This is a required argument on every `control_plane::db` repository
/// function. There is no constructor that omits `tenant_id` outside of
/// tests, which is the Rust-idiomatic replacement for the ORM-level tenant
/// interceptor described in the design notes: a call site that forgets to
/// pass a `TenantContext` simply does not compile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub principal_user_id: Uuid,
    pub role: Role,
    pub trace_id: Option<Uuid>,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid, principal_user_id: Uuid, role: Role) -> Self {
        Self {
            tenant_id,
            principal_user_id,
            role,
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    #[cfg(any(test, feature = "test-helpers"))]
    pub fn for_test(tenant_id: Uuid, user_id: Uuid, role: Role) -> Self {
        Self::new(tenant_id, user_id, role)
    }
}

/// Axum extractor that resolves a [`TenantContext`] straight from a verified
/// bearer JWT, taking the role from the token's own `roles` claim.
///
/// This is the fast path: no database round trip, so it's what service-to-
/// service calls and header/claims-only tests reach for. It does not see
/// membership changes applied after the token was issued. Production HTTP
/// handlers that must reflect the latest membership role use
/// `control_plane::http::extractors::TenantCtxExtractor` instead, which
/// additionally accepts the encrypted session cookie and re-resolves the
/// role from the database on every request.
pub struct ClaimsTenantCtxExtractor(pub TenantContext);

#[async_trait]
impl<S> FromRequestParts<S> for ClaimsTenantCtxExtractor
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Unauthorized { trace_id: None })?;

        let role = auth
            .claims
            .roles
            .iter()
            .filter_map(|raw| Role::parse_role(raw))
            .max()
            .ok_or(ApiError::Forbidden { trace_id: None })?;

        let trace_id = trace_id_from_parts(parts).unwrap_or_else(Uuid::new_v4);

        Span::current().record("tenant_id", tracing::field::display(auth.claims.tenant_id));
        Span::current().record("trace_id", tracing::field::display(trace_id));

        Ok(ClaimsTenantCtxExtractor(
            TenantContext::new(auth.claims.tenant_id, auth.claims.subject, role)
                .with_trace_id(trace_id),
        ))
    }
}

pub fn trace_id_from_parts(parts: &Parts) -> Option<Uuid> {
    parts
        .headers
        .get("X-Trace-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}
