use chrono::{DateTime, Utc};
use common_security::Role;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

pub async fn tenant_by_slug(pool: &PgPool, slug: &str) -> sqlx::Result<Option<Tenant>> {
    sqlx::query_as::<_, Tenant>(
        "SELECT id, slug, name, created_at, updated_at FROM tenants WHERE slug = $1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
}

pub async fn user_by_id(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT id, email, name, created_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// The caller's membership role for a tenant, or `None` if they are not a
/// member at all. This is the lookup every production request performs to
/// re-resolve `TenantContext::role` from the database rather than trusting
/// a possibly-stale claim.
pub async fn membership_role(
    pool: &PgPool,
    tenant_id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<Option<Role>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT role FROM memberships WHERE tenant_id = $1 AND user_id = $2")
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(role,)| Role::parse_role(&role)))
}

/// Whether `user_id` has any active membership in `tenant_id`. Used to
/// validate `Incident.assignee_id` per the spec's cross-entity invariant.
pub async fn is_member(pool: &PgPool, tenant_id: Uuid, user_id: Uuid) -> sqlx::Result<bool> {
    Ok(membership_role(pool, tenant_id, user_id).await?.is_some())
}
