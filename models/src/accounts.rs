// models/src/accounts.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Identity;
use crate::roles::Role;

/// A back-office account: admin, clinic owner, doctor, or staff member.
///
/// Staff-tier accounts always carry the owning clinic in `clinic_id`;
/// clinic-role accounts carry the clinic they administer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub first: String,
    pub last: String,
    pub email: String,
    pub role: Role,
    pub clinic_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(first: &str, last: &str, email: &str, role: Role) -> Self {
        let now = Utc::now();
        UserAccount {
            id: Uuid::new_v4().to_string(),
            first: first.to_string(),
            last: last.to_string(),
            email: email.to_string(),
            role,
            clinic_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_clinic(mut self, clinic_id: &str) -> Self {
        self.clinic_id = Some(clinic_id.to_string());
        self
    }

    /// The transient identity this account resolves to.
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id.clone(),
            role: self.role,
            clinic_id: self.clinic_id.clone(),
            email: Some(self.email.clone()),
        }
    }
}

/// A clinic registered with the back office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Clinic {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Clinic {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: None,
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
