// models/src/roles.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// The global role hierarchy.
///
/// `Admin` bypasses every check. `Clinic` and `Doctor` consult clinic-level
/// grants directly. `Agent`, `DoctorStaff`, and `Staff` are delegated roles
/// whose effective permission is bounded by their owning clinic's ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    Clinic,
    Doctor,
    Agent,
    DoctorStaff,
    Staff,
}

impl Role {
    /// The canonical string stored in records and carried in claims.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Clinic => "clinic",
            Role::Doctor => "doctor",
            Role::Agent => "agent",
            Role::DoctorStaff => "doctorStaff",
            Role::Staff => "staff",
        }
    }

    /// Whether this role receives its grants through the staff delegation layer.
    pub fn is_staff_tier(&self) -> bool {
        matches!(self, Role::Agent | Role::DoctorStaff | Role::Staff)
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    // Role tags arrived in mixed case from older clients; match case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "clinic" => Ok(Role::Clinic),
            "doctor" => Ok(Role::Doctor),
            "agent" => Ok(Role::Agent),
            "doctorstaff" => Ok(Role::DoctorStaff),
            "staff" => Ok(Role::Staff),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
