// security/src/evaluator.rs
use std::sync::Arc;

use serde::Serialize;

use models::actions::{Action, ActionSet};
use models::errors::PermissionResult;
use models::identity::Identity;
use models::permissions::ModulePermission;
use models::roles::Role;
use store::{ClinicPermissionStore, StaffPermissionStore};

/// The structured allow/deny result every protected handler gates on.
///
/// Denials are not errors: a caller can distinguish "not logged in" from
/// "logged in but lacking this specific grant" and surface the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Decision {
    pub fn allow() -> Self {
        Decision {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Decision {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Stateless, read-only permission evaluation over the two permission stores.
/// Any number of requests may evaluate concurrently with no coordination.
pub struct PermissionEvaluator {
    clinic_permissions: Arc<dyn ClinicPermissionStore>,
    staff_permissions: Arc<dyn StaffPermissionStore>,
}

impl PermissionEvaluator {
    pub fn new(
        clinic_permissions: Arc<dyn ClinicPermissionStore>,
        staff_permissions: Arc<dyn StaffPermissionStore>,
    ) -> Self {
        Self {
            clinic_permissions,
            staff_permissions,
        }
    }

    /// Does `identity` hold `action` on `module` (optionally `sub_module`)?
    ///
    /// Admin short-circuits to allowed. Staff-tier roles are judged by their
    /// delegation record alone; clinic and doctor roles by the clinic record,
    /// with doctors inheriting the clinic-role record when no doctor-specific
    /// one exists.
    pub async fn check(
        &self,
        identity: &Identity,
        module: &str,
        action: Action,
        sub_module: Option<&str>,
    ) -> PermissionResult<Decision> {
        if identity.role == Role::Admin {
            return Ok(Decision::allow());
        }

        let Some(clinic_id) = identity.clinic_id.as_deref() else {
            return Ok(Decision::deny("no clinic association"));
        };

        let permissions: Vec<ModulePermission> = if identity.role.is_staff_tier() {
            match self
                .staff_permissions
                .get(&identity.user_id, clinic_id)
                .await?
            {
                Some(record) => record.permissions,
                None => return Ok(Decision::deny("no delegation configured")),
            }
        } else {
            let mut record = self
                .clinic_permissions
                .get(clinic_id, identity.role)
                .await?;
            if record.is_none() && identity.role == Role::Doctor {
                record = self.clinic_permissions.get(clinic_id, Role::Clinic).await?;
            }
            match record {
                Some(record) => record.permissions,
                None => {
                    return Ok(Decision::deny(format!(
                        "no permissions configured for role {}",
                        identity.role
                    )))
                }
            }
        };

        Ok(evaluate(&permissions, module, action, sub_module))
    }
}

fn decide(name: &str, actions: &ActionSet, action: Action) -> Decision {
    if actions.permits(action) {
        Decision::allow()
    } else {
        Decision::deny(format!(
            "You do not have {} permission for {}",
            action, name
        ))
    }
}

/// Evaluates one resolved permission list against a request.
///
/// The module entry is found by exact name. A named sub-module, when present
/// in the record, decides alone; otherwise the module-level actions decide.
/// Sub-module entries are optional refinements, not a prerequisite.
pub fn evaluate(
    permissions: &[ModulePermission],
    module: &str,
    action: Action,
    sub_module: Option<&str>,
) -> Decision {
    let Some(entry) = permissions.iter().find(|m| m.module == module) else {
        return Decision::deny(format!("You do not have access to {}", module));
    };

    if let Some(name) = sub_module {
        if let Some(sub) = entry.find_sub_module(name) {
            return decide(name, &sub.actions, action);
        }
    }
    decide(module, &entry.actions, action)
}
