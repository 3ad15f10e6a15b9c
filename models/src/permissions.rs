// models/src/permissions.rs
//
// The two-level (module, sub-module) capability matrix, its write-time
// validation, and the pure ceiling clamp used by the staff delegation layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::{Action, ActionSet};
use crate::errors::ValidationError;

/// A named screen/feature nested under a module, e.g. "Track Expenses"
/// under "Staff Management".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubModulePermission {
    pub name: String,
    pub path: String,
    pub icon: String,
    pub order: i64,
    pub actions: ActionSet,
}

/// A named top-level feature area carrying its own action grants plus an
/// ordered list of sub-module refinements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePermission {
    pub module: String,
    pub actions: ActionSet,
    #[serde(default)]
    pub sub_modules: Vec<SubModulePermission>,
}

impl ModulePermission {
    /// Exact-name lookup of a sub-module entry.
    pub fn find_sub_module(&self, name: &str) -> Option<&SubModulePermission> {
        self.sub_modules.iter().find(|s| s.name == name)
    }
}

fn require_name(
    object: &serde_json::Map<String, Value>,
    key: &str,
    missing: ValidationError,
) -> Result<String, ValidationError> {
    match object.get(key).and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
        _ => Err(missing),
    }
}

fn validate_sub_module(value: &Value) -> Result<SubModulePermission, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::EntryNotAnObject)?;
    let name = require_name(object, "name", ValidationError::EmptySubModuleName)?;

    // Sub-modules do not nest further.
    if object.contains_key("subModules") {
        return Err(ValidationError::InvalidSubModuleField("subModules"));
    }

    let path = match object.get("path") {
        None => String::new(),
        Some(v) => v
            .as_str()
            .ok_or(ValidationError::InvalidSubModuleField("path"))?
            .to_string(),
    };
    let icon = match object.get("icon") {
        None => String::new(),
        Some(v) => v
            .as_str()
            .ok_or(ValidationError::InvalidSubModuleField("icon"))?
            .to_string(),
    };
    let order = match object.get("order") {
        None => 0,
        Some(v) => v
            .as_i64()
            .ok_or(ValidationError::InvalidSubModuleField("order"))?,
    };

    let actions = object
        .get("actions")
        .ok_or(ValidationError::ActionsNotAnObject)
        .and_then(ActionSet::from_value)?;

    Ok(SubModulePermission {
        name,
        path,
        icon,
        order,
        actions,
    })
}

/// Validates one submitted module entry.
///
/// The same rule applies whether the caller is writing a clinic-level or a
/// staff-level record; both stores funnel through here.
pub fn validate_module_permission(value: &Value) -> Result<ModulePermission, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::EntryNotAnObject)?;
    let module = require_name(object, "module", ValidationError::EmptyModuleName)?;

    let actions = object
        .get("actions")
        .ok_or(ValidationError::ActionsNotAnObject)
        .and_then(ActionSet::from_value)?;

    let sub_modules = match object.get("subModules") {
        None => Vec::new(),
        Some(v) => v
            .as_array()
            .ok_or(ValidationError::SubModulesNotAnArray)?
            .iter()
            .map(validate_sub_module)
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(ModulePermission {
        module,
        actions,
        sub_modules,
    })
}

/// Validates a full replacement list of module entries.
pub fn validate_module_permissions(
    values: &[Value],
) -> Result<Vec<ModulePermission>, ValidationError> {
    values.iter().map(validate_module_permission).collect()
}

// A submitted flag survives only if the ceiling grants that action directly
// or via `all`; the `all` shorthand itself is only implied by `all`.
fn clamp_actions(submitted: ActionSet, ceiling: ActionSet) -> ActionSet {
    ActionSet {
        all: submitted.all && ceiling.all,
        create: submitted.create && ceiling.permits(Action::Create),
        read: submitted.read && ceiling.permits(Action::Read),
        update: submitted.update && ceiling.permits(Action::Update),
        delete: submitted.delete && ceiling.permits(Action::Delete),
    }
}

/// Clamps a staff submission to the owning clinic's ceiling.
///
/// Over-broad grants are silently dropped, never persisted. Submitted modules
/// with no ceiling counterpart are dropped entirely; a sub-module without an
/// explicit ceiling entry is bounded by the ceiling module's own actions.
pub fn clamp_to_ceiling(
    submission: &[ModulePermission],
    ceiling: &[ModulePermission],
) -> Vec<ModulePermission> {
    submission
        .iter()
        .filter_map(|submitted| {
            let ceiling_module = ceiling.iter().find(|m| m.module == submitted.module)?;
            let sub_modules = submitted
                .sub_modules
                .iter()
                .map(|sub| {
                    let sub_ceiling = ceiling_module
                        .find_sub_module(&sub.name)
                        .map(|c| c.actions)
                        .unwrap_or(ceiling_module.actions);
                    SubModulePermission {
                        actions: clamp_actions(sub.actions, sub_ceiling),
                        ..sub.clone()
                    }
                })
                .collect();
            Some(ModulePermission {
                module: submitted.module.clone(),
                actions: clamp_actions(submitted.actions, ceiling_module.actions),
                sub_modules,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actions(all: bool, create: bool, read: bool, update: bool, delete: bool) -> ActionSet {
        ActionSet {
            all,
            create,
            read,
            update,
            delete,
        }
    }

    fn module(name: &str, actions: ActionSet) -> ModulePermission {
        ModulePermission {
            module: name.to_string(),
            actions,
            sub_modules: Vec::new(),
        }
    }

    fn action_set_from_bits(bits: u8) -> ActionSet {
        actions(
            bits & 1 != 0,
            bits & 2 != 0,
            bits & 4 != 0,
            bits & 8 != 0,
            bits & 16 != 0,
        )
    }

    #[test]
    fn should_validate_full_module_entry() {
        let entry = json!({
            "module": "Staff Management",
            "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false},
            "subModules": [{
                "name": "Track Expenses",
                "path": "/staff/expenses",
                "icon": "wallet",
                "order": 2,
                "actions": {"all": false, "create": false, "read": true, "update": false, "delete": false}
            }]
        });
        let parsed = validate_module_permission(&entry).unwrap();
        assert_eq!(parsed.module, "Staff Management");
        assert_eq!(parsed.sub_modules.len(), 1);
        assert_eq!(parsed.sub_modules[0].name, "Track Expenses");
        assert_eq!(parsed.sub_modules[0].order, 2);
    }

    #[test]
    fn should_reject_empty_module_name() {
        let entry = json!({
            "module": "  ",
            "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false}
        });
        assert_eq!(
            validate_module_permission(&entry).unwrap_err(),
            ValidationError::EmptyModuleName
        );
    }

    #[test]
    fn should_reject_missing_sub_module_name() {
        let entry = json!({
            "module": "Blogs",
            "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false},
            "subModules": [{
                "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false}
            }]
        });
        assert_eq!(
            validate_module_permission(&entry).unwrap_err(),
            ValidationError::EmptySubModuleName
        );
    }

    #[test]
    fn should_reject_nested_sub_modules() {
        let entry = json!({
            "module": "Blogs",
            "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false},
            "subModules": [{
                "name": "Drafts",
                "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false},
                "subModules": []
            }]
        });
        assert_eq!(
            validate_module_permission(&entry).unwrap_err(),
            ValidationError::InvalidSubModuleField("subModules")
        );
    }

    #[test]
    fn should_surface_bad_action_key_inside_sub_module() {
        let entry = json!({
            "module": "Blogs",
            "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false},
            "subModules": [{
                "name": "Drafts",
                "actions": {"all": false, "create": true, "read": true, "update": false}
            }]
        });
        assert_eq!(
            validate_module_permission(&entry).unwrap_err(),
            ValidationError::MissingActionKey("delete".to_string())
        );
    }

    // Scenario from the delegation contract: staff asks for update the clinic
    // does not hold; the stored result drops it and keeps the rest.
    #[test]
    fn clamp_drops_update_the_clinic_does_not_hold() {
        let ceiling = vec![module("Blogs", actions(false, true, true, false, false))];
        let submission = vec![module("Blogs", actions(false, true, true, true, false))];
        let clamped = clamp_to_ceiling(&submission, &ceiling);
        assert_eq!(clamped.len(), 1);
        assert_eq!(clamped[0].actions, actions(false, true, true, false, false));
    }

    #[test]
    fn clamp_drops_modules_without_a_ceiling_counterpart() {
        let ceiling = vec![module("Blogs", actions(false, true, true, false, false))];
        let submission = vec![
            module("Blogs", actions(false, true, false, false, false)),
            module("Billing", actions(false, true, true, true, true)),
        ];
        let clamped = clamp_to_ceiling(&submission, &ceiling);
        assert_eq!(clamped.len(), 1);
        assert_eq!(clamped[0].module, "Blogs");
    }

    #[test]
    fn clamp_lets_ceiling_all_imply_every_action() {
        let ceiling = vec![module("Blogs", actions(true, false, false, false, false))];
        let submission = vec![module("Blogs", actions(false, true, true, true, true))];
        let clamped = clamp_to_ceiling(&submission, &ceiling);
        assert_eq!(clamped[0].actions, actions(false, true, true, true, true));
    }

    #[test]
    fn clamp_never_grants_all_beyond_ceiling() {
        let ceiling = vec![module("Blogs", actions(false, true, true, true, true))];
        let submission = vec![module("Blogs", actions(true, false, false, false, false))];
        let clamped = clamp_to_ceiling(&submission, &ceiling);
        assert!(!clamped[0].actions.all);
    }

    #[test]
    fn clamp_sub_module_falls_back_to_module_ceiling() {
        let ceiling = vec![module(
            "Staff Management",
            actions(false, false, true, false, false),
        )];
        let mut submitted = module("Staff Management", actions(false, false, true, false, false));
        submitted.sub_modules.push(SubModulePermission {
            name: "Track Expenses".to_string(),
            path: String::new(),
            icon: String::new(),
            order: 0,
            actions: actions(false, true, true, true, false),
        });
        let clamped = clamp_to_ceiling(&[submitted], &ceiling);
        assert_eq!(
            clamped[0].sub_modules[0].actions,
            actions(false, false, true, false, false)
        );
    }

    #[test]
    fn clamp_sub_module_prefers_explicit_sub_module_ceiling() {
        let mut ceiling_module = module(
            "Staff Management",
            actions(false, false, false, false, false),
        );
        ceiling_module.sub_modules.push(SubModulePermission {
            name: "Track Expenses".to_string(),
            path: String::new(),
            icon: String::new(),
            order: 0,
            actions: actions(false, false, true, true, false),
        });
        let mut submitted = module("Staff Management", actions(false, false, false, false, false));
        submitted.sub_modules.push(SubModulePermission {
            name: "Track Expenses".to_string(),
            path: String::new(),
            icon: String::new(),
            order: 0,
            actions: actions(false, true, true, true, true),
        });
        let clamped = clamp_to_ceiling(&[submitted], &[ceiling_module]);
        assert_eq!(
            clamped[0].sub_modules[0].actions,
            actions(false, false, true, true, false)
        );
    }

    // Exhaustive grid over every (submission, ceiling) flag combination: no
    // stored flag may exceed what the ceiling implies.
    #[test]
    fn clamp_upholds_ceiling_invariant_for_every_combination() {
        for submitted_bits in 0u8..32 {
            for ceiling_bits in 0u8..32 {
                let submitted = action_set_from_bits(submitted_bits);
                let ceiling = action_set_from_bits(ceiling_bits);
                let clamped =
                    clamp_to_ceiling(&[module("M", submitted)], &[module("M", ceiling)])[0].actions;

                assert!(!clamped.all || ceiling.all);
                assert!(!clamped.create || ceiling.permits(Action::Create));
                assert!(!clamped.read || ceiling.permits(Action::Read));
                assert!(!clamped.update || ceiling.permits(Action::Update));
                assert!(!clamped.delete || ceiling.permits(Action::Delete));

                // The clamp only ever removes grants, never adds them.
                assert!(!clamped.all || submitted.all);
                assert!(!clamped.create || submitted.create);
                assert!(!clamped.read || submitted.read);
                assert!(!clamped.update || submitted.update);
                assert!(!clamped.delete || submitted.delete);
            }
        }
    }

    #[test]
    fn module_permission_serializes_with_camel_case_sub_modules() {
        let parsed: ModulePermission = serde_json::from_value(json!({
            "module": "Blogs",
            "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false},
            "subModules": []
        }))
        .unwrap();
        let rendered = serde_json::to_value(&parsed).unwrap();
        assert!(rendered.get("subModules").is_some());
    }
}
