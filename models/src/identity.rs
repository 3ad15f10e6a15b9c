// models/src/identity.rs
use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// The canonical caller identity, derived once per request from the bearer
/// claims. Transient; never persisted by this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub clinic_id: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            clinic_id: None,
            email: None,
        }
    }

    pub fn with_clinic(mut self, clinic_id: impl Into<String>) -> Self {
        self.clinic_id = Some(clinic_id.into());
        self
    }
}
