use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use common_security::TenantContext;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SavedView {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub filters: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SavedViewError {
    #[error("saved view not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SavedViewError {
    pub fn into_api_error(self, trace_id: Option<Uuid>) -> ApiError {
        match self {
            SavedViewError::NotFound => ApiError::not_found("saved_view_not_found", trace_id),
            SavedViewError::Forbidden => ApiError::Forbidden { trace_id },
            SavedViewError::Validation(message) => ApiError::BadRequest {
                code: "invalid_saved_view",
                trace_id,
                message: Some(message),
            },
            SavedViewError::Database(err) => ApiError::internal(err, trace_id),
        }
    }
}

pub async fn create(
    pool: &PgPool,
    ctx: &TenantContext,
    name: String,
    filters: serde_json::Value,
) -> Result<SavedView, SavedViewError> {
    if name.trim().is_empty() {
        return Err(SavedViewError::Validation("name must not be empty".into()));
    }
    let view = sqlx::query_as::<_, SavedView>(
        r#"
        INSERT INTO saved_views (id, tenant_id, user_id, name, filters)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, tenant_id, user_id, name, filters, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(ctx.principal_user_id)
    .bind(&name)
    .bind(&filters)
    .fetch_one(pool)
    .await?;
    Ok(view)
}

pub async fn list_for_user(pool: &PgPool, ctx: &TenantContext) -> Result<Vec<SavedView>, SavedViewError> {
    let views = sqlx::query_as::<_, SavedView>(
        "SELECT id, tenant_id, user_id, name, filters, created_at FROM saved_views WHERE tenant_id = $1 AND user_id = $2 ORDER BY created_at DESC",
    )
    .bind(ctx.tenant_id)
    .bind(ctx.principal_user_id)
    .fetch_all(pool)
    .await?;
    Ok(views)
}

/// Owners may always delete their own view; deleting someone else's
/// requires ADMIN, per `Role::can_delete_foreign_saved_view`.
pub async fn delete(pool: &PgPool, ctx: &TenantContext, view_id: Uuid) -> Result<(), SavedViewError> {
    let view = sqlx::query_as::<_, SavedView>(
        "SELECT id, tenant_id, user_id, name, filters, created_at FROM saved_views WHERE id = $1 AND tenant_id = $2",
    )
    .bind(view_id)
    .bind(ctx.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(SavedViewError::NotFound)?;

    if view.user_id != ctx.principal_user_id && !ctx.role.can_delete_foreign_saved_view() {
        return Err(SavedViewError::Forbidden);
    }

    sqlx::query("DELETE FROM saved_views WHERE id = $1 AND tenant_id = $2")
        .bind(view_id)
        .bind(ctx.tenant_id)
        .execute(pool)
        .await?;
    Ok(())
}
