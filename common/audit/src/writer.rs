use chrono::Utc;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{AuditActor, AuditError, AuditEvent, AuditResult};

/// Inserts one audit row as part of the caller's transaction.
///
/// Callers always hold an open [`Transaction`] for the mutation being
/// audited (incident update, flag change, membership change, ...) and pass
/// it straight through here, so the audit row commits or rolls back with
/// the mutation it describes.
pub async fn write_audit_row(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    actor: &AuditActor,
    entity_type: &str,
    entity_id: Option<Uuid>,
    action: &str,
    changes: serde_json::Value,
    meta: serde_json::Value,
) -> AuditResult<AuditEvent> {
    let id = Uuid::new_v4();
    let occurred_at = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO audit_log
            (id, tenant_id, actor_id, actor_name, actor_email, entity_type, entity_id, action, occurred_at, changes, meta)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(actor.id)
    .bind(&actor.name)
    .bind(&actor.email)
    .bind(entity_type)
    .bind(entity_id)
    .bind(action)
    .bind(occurred_at)
    .bind(&changes)
    .bind(&meta)
    .execute(&mut **tx)
    .await
    .map_err(|e| AuditError::Database(e.to_string()))?;

    Ok(AuditEvent {
        id,
        tenant_id,
        actor: actor.clone(),
        entity_type: entity_type.to_string(),
        entity_id,
        action: action.to_string(),
        occurred_at,
        changes,
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_from_principal_sets_id() {
        let uid = Uuid::new_v4();
        let actor = AuditActor::from_principal(uid, Some("Ada".into()), None);
        assert_eq!(actor.id, Some(uid));
        assert_eq!(actor.name.as_deref(), Some("Ada"));
        assert!(actor.email.is_none());
    }
}
