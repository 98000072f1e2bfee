use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use common_auth::AuthContext;
use common_http_errors::ApiError;
use common_security::context::trace_id_from_parts;
use common_security::TenantContext;
use tracing::Span;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::tenant::membership_role;
use crate::http::session::{decode_session_cookie, SESSION_COOKIE_NAME};

/// The production tenant-context extractor: cookie session first, bearer
/// JWT as a fallback for service-to-service calls, then a fresh membership
/// role lookup against the database on every request so a revoked member
/// is locked out immediately rather than waiting for their token to expire.
pub struct TenantCtxExtractor(pub TenantContext);

#[async_trait]
impl FromRequestParts<AppState> for TenantCtxExtractor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let trace_id = trace_id_from_parts(parts).unwrap_or_else(Uuid::new_v4);

        let (tenant_id, principal_user_id) = match session_identity(parts, state) {
            Some(identity) => identity,
            None => bearer_identity(parts, state)
                .await
                .ok_or(ApiError::Unauthorized { trace_id: Some(trace_id) })?,
        };

        let role = membership_role(&state.pool, tenant_id, principal_user_id)
            .await
            .map_err(|e| ApiError::internal(e, Some(trace_id)))?
            .ok_or(ApiError::Forbidden { trace_id: Some(trace_id) })?;

        Span::current().record("tenant_id", tracing::field::display(tenant_id));
        Span::current().record("trace_id", tracing::field::display(trace_id));

        Ok(TenantCtxExtractor(
            TenantContext::new(tenant_id, principal_user_id, role).with_trace_id(trace_id),
        ))
    }
}

fn session_identity(parts: &Parts, state: &AppState) -> Option<(Uuid, Uuid)> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar.get(SESSION_COOKIE_NAME)?;
    let payload = decode_session_cookie(&state.session_key, cookie.value())?;
    Some(payload.into_pair())
}

async fn bearer_identity(parts: &mut Parts, state: &AppState) -> Option<(Uuid, Uuid)> {
    let auth = AuthContext::from_request_parts(parts, state).await.ok()?;
    Some((auth.claims.tenant_id, auth.claims.subject))
}
