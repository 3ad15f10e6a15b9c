// models/src/records.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permissions::ModulePermission;
use crate::roles::Role;

/// The single source of truth for what a role may do inside one clinic.
///
/// At most one active record exists per `(clinic_id, role)`. Records written
/// before roles were introduced carry no role tag; reads normalize a missing
/// tag to `clinic`, and the next admin write re-keys the record (see the
/// clinic permission store's backfill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicPermission {
    pub clinic_id: String,
    pub role: Option<Role>,
    pub permissions: Vec<ModulePermission>,
    pub is_active: bool,
    pub granted_by: String,
    pub last_modified: DateTime<Utc>,
}

impl ClinicPermission {
    /// The effective role of this record; legacy untagged rows count as `clinic`.
    pub fn role(&self) -> Role {
        self.role.unwrap_or(Role::Clinic)
    }

    /// Exact-name lookup of a module entry.
    pub fn find_module(&self, module: &str) -> Option<&ModulePermission> {
        self.permissions.iter().find(|m| m.module == module)
    }
}

/// A clinic's delegation of (a subset of) its own ceiling to one staff member.
///
/// One record per `(staff_id, clinic_id)`. Invariant: every action granted
/// here is also granted by the clinic's own record for `role`, enforced at
/// write time by the ceiling clamp, so a persisted record never exceeds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffPermission {
    pub staff_id: String,
    pub clinic_id: String,
    pub role: Role,
    pub permissions: Vec<ModulePermission>,
    pub is_active: bool,
    pub granted_by: String,
    pub last_modified: DateTime<Utc>,
}

impl StaffPermission {
    pub fn find_module(&self, module: &str) -> Option<&ModulePermission> {
        self.permissions.iter().find(|m| m.module == module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionSet;

    fn record(role: Option<Role>) -> ClinicPermission {
        ClinicPermission {
            clinic_id: "c-1".to_string(),
            role,
            permissions: vec![ModulePermission {
                module: "Blogs".to_string(),
                actions: ActionSet {
                    read: true,
                    ..ActionSet::default()
                },
                sub_modules: Vec::new(),
            }],
            is_active: true,
            granted_by: "admin-1".to_string(),
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn legacy_records_normalize_to_clinic_role() {
        assert_eq!(record(None).role(), Role::Clinic);
        assert_eq!(record(Some(Role::Doctor)).role(), Role::Doctor);
    }

    #[test]
    fn module_lookup_is_exact_name_match() {
        let rec = record(Some(Role::Clinic));
        assert!(rec.find_module("Blogs").is_some());
        assert!(rec.find_module("blogs").is_none());
    }
}
