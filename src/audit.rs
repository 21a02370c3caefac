use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::{error::AppResult, models::AuditEntry, store::AuditStore};

pub async fn log_audit<S: AuditStore + ?Sized>(
    store: &S,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    let entry = AuditEntry {
        id: Uuid::new_v4(),
        user_id,
        action: action.to_string(),
        resource: resource.map(str::to_string),
        metadata,
        created_at: Utc::now(),
    };
    store.record_audit(entry).await?;
    Ok(())
}

/// Audit failures never fail the request that triggered them.
pub async fn record<S: AuditStore + ?Sized>(
    store: &S,
    user_id: Option<Uuid>,
    action: &str,
    resource: &str,
    metadata: Value,
) {
    if let Err(err) = log_audit(store, user_id, action, Some(resource), Some(metadata)).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
