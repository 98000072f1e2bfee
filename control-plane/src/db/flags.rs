use chrono::{DateTime, Utc};
use common_audit::write_audit_row;
use common_security::TenantContext;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::flags::{validate_rule, FlagError, Rule};
use crate::incidents::Environment;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeatureFlagRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub environment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureFlag {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub environment: String,
    pub rules: Vec<Rule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    condition: serde_json::Value,
}

fn ensure_can_write(ctx: &TenantContext) -> Result<(), FlagError> {
    if ctx.role.can_write() {
        Ok(())
    } else {
        Err(FlagError::Forbidden)
    }
}

/// An unparseable stored rule is logged and dropped rather than failing the
/// whole read: one corrupt row shouldn't take a flag's evaluation down with
/// it. A dropped rule can never match, so it behaves as non-matching.
async fn rules_for_flag(pool: &PgPool, flag_id: Uuid) -> Result<Vec<Rule>, FlagError> {
    let rows = sqlx::query_as::<_, RuleRow>(
        r#"SELECT condition FROM rules WHERE flag_id = $1 ORDER BY "order" ASC"#,
    )
    .bind(flag_id)
    .fetch_all(pool)
    .await?;
    let mut rules = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<Rule>(row.condition) {
            Ok(rule) => rules.push(rule),
            Err(err) => {
                tracing::warn!(flag_id = %flag_id, error = %err, "skipping unparseable stored rule");
            }
        }
    }
    Ok(rules)
}

async fn hydrate(pool: &PgPool, row: FeatureFlagRow) -> Result<FeatureFlag, FlagError> {
    let rules = rules_for_flag(pool, row.id).await?;
    Ok(FeatureFlag {
        id: row.id,
        tenant_id: row.tenant_id,
        key: row.key,
        name: row.name,
        description: row.description,
        enabled: row.enabled,
        environment: row.environment,
        rules,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub struct NewFlag {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub environment: Environment,
    pub enabled: bool,
}

pub async fn create(
    pool: &PgPool,
    ctx: &TenantContext,
    new: NewFlag,
) -> Result<FeatureFlag, FlagError> {
    ensure_can_write(ctx)?;
    if new.key.trim().is_empty() {
        return Err(FlagError::Validation("key must not be empty".into()));
    }

    let existing: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM feature_flags WHERE tenant_id = $1 AND key = $2 AND environment = $3",
    )
    .bind(ctx.tenant_id)
    .bind(&new.key)
    .bind(new.environment.as_str())
    .fetch_optional(pool)
    .await?;
    if existing.is_some() {
        return Err(FlagError::Duplicate);
    }

    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, FeatureFlagRow>(
        r#"
        INSERT INTO feature_flags (id, tenant_id, key, name, description, enabled, environment)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, tenant_id, key, name, description, enabled, environment, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(&new.key)
    .bind(&new.name)
    .bind(&new.description)
    .bind(new.enabled)
    .bind(new.environment.as_str())
    .fetch_one(&mut *tx)
    .await?;

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &common_audit::AuditActor::from_principal(ctx.principal_user_id, None, None),
        "feature_flag",
        Some(row.id),
        "CREATE",
        serde_json::json!({}),
        serde_json::to_value(&row).unwrap_or_default(),
    )
    .await
    .map_err(|e| FlagError::Validation(e.to_string()))?;

    tx.commit().await?;
    hydrate(pool, row).await
}

pub async fn get(pool: &PgPool, ctx: &TenantContext, flag_id: Uuid) -> Result<FeatureFlag, FlagError> {
    let row = sqlx::query_as::<_, FeatureFlagRow>(
        "SELECT id, tenant_id, key, name, description, enabled, environment, created_at, updated_at FROM feature_flags WHERE id = $1 AND tenant_id = $2",
    )
    .bind(flag_id)
    .bind(ctx.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(FlagError::NotFound)?;
    hydrate(pool, row).await
}

pub async fn get_by_key(
    pool: &PgPool,
    ctx: &TenantContext,
    key: &str,
    environment: &str,
) -> Result<FeatureFlag, FlagError> {
    let row = sqlx::query_as::<_, FeatureFlagRow>(
        "SELECT id, tenant_id, key, name, description, enabled, environment, created_at, updated_at FROM feature_flags WHERE tenant_id = $1 AND key = $2 AND environment = $3",
    )
    .bind(ctx.tenant_id)
    .bind(key)
    .bind(environment)
    .fetch_optional(pool)
    .await?
    .ok_or(FlagError::NotFound)?;
    hydrate(pool, row).await
}

pub async fn list(
    pool: &PgPool,
    ctx: &TenantContext,
    environment: Option<Environment>,
) -> Result<Vec<FeatureFlag>, FlagError> {
    let rows: Vec<FeatureFlagRow> = if let Some(environment) = environment {
        sqlx::query_as(
            "SELECT id, tenant_id, key, name, description, enabled, environment, created_at, updated_at FROM feature_flags WHERE tenant_id = $1 AND environment = $2 ORDER BY key ASC",
        )
        .bind(ctx.tenant_id)
        .bind(environment.as_str())
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as(
            "SELECT id, tenant_id, key, name, description, enabled, environment, created_at, updated_at FROM feature_flags WHERE tenant_id = $1 ORDER BY key ASC",
        )
        .bind(ctx.tenant_id)
        .fetch_all(pool)
        .await?
    };

    let mut flags = Vec::with_capacity(rows.len());
    for row in rows {
        flags.push(hydrate(pool, row).await?);
    }
    Ok(flags)
}

pub async fn set_enabled(
    pool: &PgPool,
    ctx: &TenantContext,
    flag_id: Uuid,
    enabled: bool,
) -> Result<FeatureFlag, FlagError> {
    ensure_can_write(ctx)?;
    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, FeatureFlagRow>(
        r#"
        UPDATE feature_flags SET enabled = $1, updated_at = now()
        WHERE id = $2 AND tenant_id = $3
        RETURNING id, tenant_id, key, name, description, enabled, environment, created_at, updated_at
        "#,
    )
    .bind(enabled)
    .bind(flag_id)
    .bind(ctx.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(FlagError::NotFound)?;

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &common_audit::AuditActor::from_principal(ctx.principal_user_id, None, None),
        "feature_flag",
        Some(flag_id),
        if enabled { "ENABLE" } else { "DISABLE" },
        serde_json::json!({}),
        serde_json::to_value(&row).unwrap_or_default(),
    )
    .await
    .map_err(|e| FlagError::Validation(e.to_string()))?;

    tx.commit().await?;
    hydrate(pool, row).await
}

pub async fn delete(pool: &PgPool, ctx: &TenantContext, flag_id: Uuid) -> Result<(), FlagError> {
    ensure_can_write(ctx)?;
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM feature_flags WHERE id = $1 AND tenant_id = $2")
        .bind(flag_id)
        .bind(ctx.tenant_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(FlagError::NotFound);
    }

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &common_audit::AuditActor::from_principal(ctx.principal_user_id, None, None),
        "feature_flag",
        Some(flag_id),
        "DELETE",
        serde_json::json!({}),
        serde_json::json!({}),
    )
    .await
    .map_err(|e| FlagError::Validation(e.to_string()))?;

    tx.commit().await?;
    Ok(())
}

/// Replaces a flag's rule list wholesale: delete-then-reinsert inside one
/// transaction, ordered by list position. Every rule is validated before
/// any write happens so a bad rule never partially lands.
pub async fn replace_rules(
    pool: &PgPool,
    ctx: &TenantContext,
    flag_id: Uuid,
    rules: Vec<Rule>,
) -> Result<FeatureFlag, FlagError> {
    ensure_can_write(ctx)?;
    for rule in &rules {
        validate_rule(rule)?;
    }

    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, FeatureFlagRow>(
        "SELECT id, tenant_id, key, name, description, enabled, environment, created_at, updated_at FROM feature_flags WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(flag_id)
    .bind(ctx.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(FlagError::NotFound)?;

    sqlx::query("DELETE FROM rules WHERE flag_id = $1")
        .bind(flag_id)
        .execute(&mut *tx)
        .await?;

    for (order, rule) in rules.iter().enumerate() {
        let rule_type = match rule {
            Rule::Allowlist { .. } => "ALLOWLIST",
            Rule::PercentRollout { .. } => "PERCENT_ROLLOUT",
            Rule::And { .. } => "AND",
            Rule::Or { .. } => "OR",
        };
        sqlx::query(
            r#"INSERT INTO rules (id, flag_id, type, condition, "order") VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(Uuid::new_v4())
        .bind(flag_id)
        .bind(rule_type)
        .bind(serde_json::to_value(rule).unwrap())
        .bind(order as i32)
        .execute(&mut *tx)
        .await?;
    }

    write_audit_row(
        &mut tx,
        ctx.tenant_id,
        &common_audit::AuditActor::from_principal(ctx.principal_user_id, None, None),
        "feature_flag",
        Some(flag_id),
        "RULES_UPDATE",
        serde_json::json!({}),
        serde_json::json!({"rule_count": rules.len()}),
    )
    .await
    .map_err(|e| FlagError::Validation(e.to_string()))?;

    tx.commit().await?;
    hydrate(pool, row).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_type_tag_matches_db_check_constraint() {
        let allowlist = Rule::Allowlist { user_ids: vec![] };
        let rollout = Rule::PercentRollout { percentage: 10 };
        assert!(validate_rule(&allowlist).is_ok());
        assert!(validate_rule(&rollout).is_ok());
    }
}
