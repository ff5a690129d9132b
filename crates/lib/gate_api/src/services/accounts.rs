//! Account management: admin-driven changes to users and admins.
//!
//! Every change that must cut off existing sessions (user password reset,
//! phone change, deletion) increments the token version in the same store
//! write. Admin password, username and role changes leave admin tokens valid.

use gate_core::auth::password::hash_blocking;
use gate_core::auth::{validate_password, validate_phone};
use gate_core::models::audit::AuditStatus;
use gate_core::models::auth::{Admin, AdminRole, User};
use gate_core::store::{
    AdminUpdate, NewAdmin, NewAuditEntry, NewUser, Page, StoreError, UserUpdate,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::actor::Actor;
use crate::models::{
    CreateAdminRequest, CreateUserRequest, ListParams, UpdateAdminRequest, UpdateUserRequest,
    parse_role,
};

/// Write an audit entry and mirror it on the `audit` tracing target. A
/// failed write is logged and never fails the request.
async fn record(state: &AppState, actor: &Actor, event: AuditEvent<'_>) {
    let admin = &actor.admin;
    match event.status {
        AuditStatus::Success => info!(
            target: "audit",
            actor_id = %admin.id,
            actor = %admin.username,
            action = event.action,
            resource = event.resource_type,
            resource_id = %event.resource_id,
            details = event.details.as_deref(),
            outcome = "success",
            "admin action"
        ),
        AuditStatus::Failed => warn!(
            target: "audit",
            actor_id = %admin.id,
            actor = %admin.username,
            action = event.action,
            resource = event.resource_type,
            resource_id = %event.resource_id,
            reason = event.error_message,
            outcome = "denied",
            "admin action"
        ),
    }

    let entry = NewAuditEntry {
        admin_id: admin.id,
        admin_name: admin.username.clone(),
        action: event.action.to_string(),
        resource_type: event.resource_type.to_string(),
        resource_id: event.resource_id.to_string(),
        details: event.details,
        ip_address: actor.ip_address.clone(),
        user_agent: actor.user_agent.clone(),
        status: event.status,
        error_message: event.error_message.map(str::to_string),
    };
    if let Err(e) = state.audit.record_audit(entry).await {
        warn!(action = event.action, error = %e, "failed to write audit entry");
    }
}

struct AuditEvent<'a> {
    action: &'a str,
    resource_type: &'a str,
    resource_id: Uuid,
    details: Option<String>,
    status: AuditStatus,
    error_message: Option<&'a str>,
}

async fn audit(
    state: &AppState,
    actor: &Actor,
    action: &str,
    resource_type: &str,
    resource_id: Uuid,
    details: Option<String>,
) {
    let event = AuditEvent {
        action,
        resource_type,
        resource_id,
        details,
        status: AuditStatus::Success,
        error_message: None,
    };
    record(state, actor, event).await;
}

async fn audit_denied(
    state: &AppState,
    actor: &Actor,
    action: &str,
    resource_type: &str,
    resource_id: Uuid,
    why: &str,
) {
    let event = AuditEvent {
        action,
        resource_type,
        resource_id,
        details: None,
        status: AuditStatus::Failed,
        error_message: Some(why),
    };
    record(state, actor, event).await;
}

/// Join the present change descriptions; `None` when nothing changed.
fn changes<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn conflict_on_duplicate(message: &'static str) -> impl Fn(StoreError) -> AppError {
    move |e| match e {
        StoreError::Duplicate(_) => AppError::Conflict(message.into()),
        other => AppError::from(other),
    }
}

async fn hash(state: &AppState, password: &str) -> AppResult<String> {
    Ok(hash_blocking(state.hasher.clone(), password.to_string()).await?)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// `true` when `phone` is valid and no live user holds it.
pub async fn phone_available(state: &AppState, phone: &str) -> AppResult<bool> {
    validate_phone(phone)?;
    Ok(!state.store.phone_exists(phone).await?)
}

pub async fn list_users(state: &AppState, params: &ListParams) -> AppResult<Page<User>> {
    Ok(state.store.list_users(&params.to_query()).await?)
}

pub async fn get_user(state: &AppState, id: Uuid) -> AppResult<User> {
    state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn create_user(
    state: &AppState,
    actor: &Actor,
    req: CreateUserRequest,
) -> AppResult<User> {
    validate_phone(&req.phone)?;
    validate_password(&req.password)?;
    if state.store.phone_exists(&req.phone).await? {
        return Err(AppError::Conflict(
            "User with this phone number already exists".into(),
        ));
    }

    let password_hash = hash(state, &req.password).await?;
    let user = state
        .store
        .create_user(NewUser {
            phone: req.phone,
            password_hash,
        })
        .await
        .map_err(conflict_on_duplicate(
            "User with this phone number already exists",
        ))?;

    let details = format!("phone {}", user.phone);
    audit(state, actor, "create_user", "user", user.id, Some(details)).await;
    Ok(user)
}

/// Password reset and phone change both invalidate the user's tokens.
pub async fn update_user(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    req: UpdateUserRequest,
) -> AppResult<User> {
    let req = UpdateUserRequest {
        phone: req.phone.filter(|p| !p.is_empty()),
        password: req.password.filter(|p| !p.is_empty()),
    };
    if req.phone.is_none() && req.password.is_none() {
        return Err(AppError::Validation(
            "At least one field (phone or password) must be provided".into(),
        ));
    }
    if let Some(password) = &req.password {
        validate_password(password)?;
    }

    let current = get_user(state, id).await?;

    let mut update = UserUpdate::default();
    if let Some(phone) = req.phone
        && phone != current.phone
    {
        validate_phone(&phone)?;
        if state.store.phone_exists(&phone).await? {
            return Err(AppError::Conflict("Phone number is already in use".into()));
        }
        update.phone = Some(phone);
        update.bump_version = true;
    }
    if let Some(password) = &req.password {
        update.password_hash = Some(hash(state, password).await?);
        update.bump_version = true;
    }

    let bumped = update.bump_version;
    let details = changes([
        update.phone.as_ref().map(|p| format!("phone {} -> {p}", current.phone)),
        update.password_hash.as_ref().map(|_| "password reset".to_string()),
    ]);
    let user = state
        .store
        .update_user(id, update)
        .await
        .map_err(conflict_on_duplicate("Phone number is already in use"))?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if bumped {
        info!(id = %user.id, token_version = user.token_version, "user sessions invalidated by update");
    }
    audit(state, actor, "update_user", "user", user.id, details).await;
    Ok(user)
}

/// Soft-delete a user; its tokens stop working immediately.
pub async fn delete_user(state: &AppState, actor: &Actor, id: Uuid) -> AppResult<User> {
    let user = get_user(state, id).await?;
    if !state.store.soft_delete_user(id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    let details = format!("phone {}", user.phone);
    audit(state, actor, "delete_user", "user", id, Some(details)).await;
    Ok(user)
}

// ---------------------------------------------------------------------------
// Admins
// ---------------------------------------------------------------------------

pub async fn list_admins(state: &AppState, params: &ListParams) -> AppResult<Page<Admin>> {
    let role = params.role_filter()?;
    Ok(state.store.list_admins(&params.to_query(), role).await?)
}

/// Standard admins may only read their own record.
pub async fn get_admin(state: &AppState, actor: &Actor, id: Uuid) -> AppResult<Admin> {
    if actor.admin.role != AdminRole::Elevated && actor.admin.id != id {
        return Err(AppError::Forbidden(
            "Regular admins can only access their own record".into(),
        ));
    }
    state
        .store
        .find_admin_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Admin not found".into()))
}

pub async fn create_admin(
    state: &AppState,
    actor: &Actor,
    req: CreateAdminRequest,
) -> AppResult<Admin> {
    let role = parse_role(&req.role)?;
    if req.username.trim().is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    validate_password(&req.password)?;
    if state.store.username_exists(&req.username).await? {
        return Err(AppError::Conflict(
            "Admin with this username already exists".into(),
        ));
    }

    let password_hash = hash(state, &req.password).await?;
    let admin = state
        .store
        .create_admin(NewAdmin {
            id: None,
            username: req.username,
            password_hash,
            role,
        })
        .await
        .map_err(conflict_on_duplicate(
            "Admin with this username already exists",
        ))?;

    let details = format!("username {}, role {}", admin.username, admin.role);
    audit(state, actor, "create_admin", "admin", admin.id, Some(details)).await;
    Ok(admin)
}

/// Standard admins may only update themselves and never change a role.
pub async fn update_admin(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    req: UpdateAdminRequest,
) -> AppResult<Admin> {
    let elevated = actor.admin.role == AdminRole::Elevated;
    if !elevated && actor.admin.id != id {
        audit_denied(state, actor, "update_admin", "admin", id, "not own record").await;
        return Err(AppError::Forbidden(
            "Regular admins can only update their own record".into(),
        ));
    }
    if req.password.is_none() && req.username.is_none() && req.role.is_none() {
        return Err(AppError::Validation(
            "At least one field (password, username, or role) must be provided".into(),
        ));
    }
    if req.role.is_some() && !elevated {
        audit_denied(state, actor, "update_admin", "admin", id, "role change").await;
        return Err(AppError::Forbidden(
            "Only super admins can change admin roles".into(),
        ));
    }

    let role = req.role.as_deref().map(parse_role).transpose()?;
    if let Some(username) = &req.username
        && username.trim().is_empty()
    {
        return Err(AppError::Validation("Username cannot be empty".into()));
    }
    let password_hash = match &req.password {
        Some(password) => {
            validate_password(password)?;
            Some(hash(state, password).await?)
        }
        None => None,
    };

    let details = changes([
        req.username.as_ref().map(|u| format!("username -> {u}")),
        password_hash.as_ref().map(|_| "password changed".to_string()),
        role.map(|r| format!("role -> {r}")),
    ]);
    let admin = state
        .store
        .update_admin(
            id,
            AdminUpdate {
                username: req.username,
                password_hash,
                role,
            },
        )
        .await
        .map_err(conflict_on_duplicate(
            "Admin with this username already exists",
        ))?
        .ok_or_else(|| AppError::NotFound("Admin not found".into()))?;

    audit(state, actor, "update_admin", "admin", admin.id, details).await;
    Ok(admin)
}

/// Soft-delete an admin. The bootstrap admin cannot be deleted.
pub async fn delete_admin(state: &AppState, actor: &Actor, id: Uuid) -> AppResult<Admin> {
    if id == state.config.bootstrap_admin.id {
        audit_denied(state, actor, "delete_admin", "admin", id, "bootstrap admin").await;
        return Err(AppError::Forbidden(
            "Cannot delete the initial super admin".into(),
        ));
    }
    let admin = state
        .store
        .find_admin_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Admin not found".into()))?;
    if !state.store.soft_delete_admin(id).await? {
        return Err(AppError::NotFound("Admin not found".into()));
    }
    let details = format!("username {}", admin.username);
    audit(state, actor, "delete_admin", "admin", id, Some(details)).await;
    Ok(admin)
}
