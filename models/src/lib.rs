// models/src/lib.rs

pub mod accounts;
pub mod actions;
pub mod errors;
pub mod identity;
pub mod permissions;
pub mod records;
pub mod roles;

pub use accounts::{Clinic, UserAccount};
pub use actions::{Action, ActionSet};
pub use errors::{PermissionError, PermissionResult, ValidationError};
pub use identity::Identity;
pub use permissions::{
    clamp_to_ceiling, validate_module_permission, validate_module_permissions, ModulePermission,
    SubModulePermission,
};
pub use records::{ClinicPermission, StaffPermission};
pub use roles::Role;
