use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditActor {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuditActor {
    pub fn from_principal(user_id: Uuid, name: Option<String>, email: Option<String>) -> Self {
        Self { id: Some(user_id), name, email }
    }
}

/// A single row in the tenant's audit log. Every mutation to an incident,
/// feature flag, or membership writes one of these in the same transaction
/// as the mutation itself, so a crash mid-write leaves neither behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub actor: AuditActor,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub action: String,
    pub occurred_at: DateTime<Utc>,
    pub changes: serde_json::Value,
    pub meta: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("database error: {0}")]
    Database(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
