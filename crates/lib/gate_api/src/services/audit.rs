//! Read side of the admin audit log.

use gate_core::models::audit::AuditEntry;
use gate_core::store::Page;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::AuditLogParams;

pub async fn list_audit_logs(
    state: &AppState,
    params: &AuditLogParams,
) -> AppResult<Page<AuditEntry>> {
    let filter = params.filter()?;
    Ok(state.audit.list_audit(&params.to_query(), &filter).await?)
}

pub async fn get_audit_log(state: &AppState, id: Uuid) -> AppResult<AuditEntry> {
    state
        .audit
        .find_audit(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Audit log not found".into()))
}
