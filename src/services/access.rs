//! Authorization rules. Pure functions over the resolved [`Principal`].

use crate::models::auth::Principal;
use crate::models::task::Task;
use crate::utils::errors::ServiceError;

pub fn require_authenticated(principal: Option<Principal>) -> Result<Principal, ServiceError> {
    principal.ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))
}

pub fn ensure_active(principal: &Principal) -> Result<(), ServiceError> {
    if principal.is_active {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied("User account is inactive".to_string()))
    }
}

/// Write access to categories and statuses.
pub fn ensure_staff(principal: Option<Principal>) -> Result<Principal, ServiceError> {
    let principal = require_authenticated(principal)?;
    if principal.is_staff {
        Ok(principal)
    } else {
        log::warn!("User {} attempted a staff-only operation", principal.id);
        Err(ServiceError::PermissionDenied("Staff privileges required".to_string()))
    }
}

pub fn ensure_owner(
    principal: &Principal,
    owner_id: i32,
    resource: &str,
) -> Result<(), ServiceError> {
    if principal.id == owner_id {
        Ok(())
    } else {
        log::warn!("User {} is not the owner of this {}", principal.id, resource);
        Err(ServiceError::PermissionDenied(format!(
            "You aren't allowed to modify this {}",
            resource
        )))
    }
}

/// Unavailable tasks are readable by their owner only; anonymous callers are refused too.
pub fn ensure_can_view_task(
    principal: Option<&Principal>,
    task: &Task,
) -> Result<(), ServiceError> {
    if task.available {
        return Ok(());
    }

    match principal {
        Some(p) if p.id == task.user_id => Ok(()),
        _ => Err(ServiceError::PermissionDenied("You aren't allowed".to_string())),
    }
}
