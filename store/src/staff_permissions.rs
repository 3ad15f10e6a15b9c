// store/src/staff_permissions.rs
use std::sync::Arc;

use async_trait::async_trait;
use bincode::{
    config::{BigEndian, Configuration, Fixint},
    serde::{decode_from_slice, encode_to_vec},
};
use chrono::Utc;
use log::debug;
use serde_json::Value;
use sled::{Db, Tree};

use models::errors::{PermissionError, PermissionResult};
use models::identity::Identity;
use models::permissions::{clamp_to_ceiling, validate_module_permissions};
use models::records::StaffPermission;

use crate::bincode_config;
use crate::clinic_permissions::ClinicPermissionStore;
use crate::directory::DirectoryStore;

/// Owns per-staff permission overrides, constrained to the owning clinic's
/// ceiling for the staff member's role.
#[async_trait]
pub trait StaffPermissionStore: Send + Sync + 'static {
    /// Returns the single active delegation record for the pair, or none.
    async fn get(
        &self,
        staff_id: &str,
        clinic_id: &str,
    ) -> PermissionResult<Option<StaffPermission>>;

    /// Validates, clamps to the clinic ceiling, and replaces-or-inserts.
    ///
    /// The staff member must belong to the clinic and hold a staff-tier role.
    /// The clinic must hold an active record for that role; a clinic cannot
    /// delegate what it has not itself been granted. Grants exceeding the
    /// ceiling are silently dropped; only the clamped result is persisted.
    async fn upsert(
        &self,
        staff_id: &str,
        clinic_id: &str,
        permissions: &[Value],
        granted_by: &Identity,
    ) -> PermissionResult<StaffPermission>;

    /// Soft-deletes the delegation record. Idempotent.
    async fn deactivate(&self, staff_id: &str, clinic_id: &str) -> PermissionResult<()>;
}

/// Sled-backed implementation of the `StaffPermissionStore` trait.
pub struct SledStaffPermissionStore {
    tree: Tree,
    directory: Arc<dyn DirectoryStore>,
    clinic_permissions: Arc<dyn ClinicPermissionStore>,
    config: Configuration<BigEndian, Fixint>,
}

fn record_key(staff_id: &str, clinic_id: &str) -> Vec<u8> {
    format!("{}/{}", staff_id, clinic_id).into_bytes()
}

impl SledStaffPermissionStore {
    /// Opens the "staff_permissions" tree on the shared database.
    pub fn new(
        db: &Db,
        directory: Arc<dyn DirectoryStore>,
        clinic_permissions: Arc<dyn ClinicPermissionStore>,
    ) -> PermissionResult<Self> {
        Ok(Self {
            tree: db.open_tree("staff_permissions")?,
            directory,
            clinic_permissions,
            config: bincode_config(),
        })
    }

    fn read(&self, key: &[u8]) -> PermissionResult<Option<StaffPermission>> {
        if let Some(bytes) = self.tree.get(key)? {
            let (record, _): (StaffPermission, usize) =
                decode_from_slice(&bytes, self.config.clone())?;
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    fn write(&self, key: &[u8], record: &StaffPermission) -> PermissionResult<()> {
        let bytes = encode_to_vec(record, self.config.clone())?;
        self.tree.insert(key, bytes)?;
        Ok(())
    }
}

#[async_trait]
impl StaffPermissionStore for SledStaffPermissionStore {
    async fn get(
        &self,
        staff_id: &str,
        clinic_id: &str,
    ) -> PermissionResult<Option<StaffPermission>> {
        if let Some(record) = self.read(&record_key(staff_id, clinic_id))? {
            return Ok(record.is_active.then_some(record));
        }
        Ok(None)
    }

    async fn upsert(
        &self,
        staff_id: &str,
        clinic_id: &str,
        permissions: &[Value],
        granted_by: &Identity,
    ) -> PermissionResult<StaffPermission> {
        let staff = self
            .directory
            .get_user_by_id(staff_id)
            .await?
            .ok_or_else(|| PermissionError::NotFound(format!("staff member {}", staff_id)))?;

        if staff.clinic_id.as_deref() != Some(clinic_id) {
            return Err(PermissionError::NotAuthorized(format!(
                "staff member {} does not belong to clinic {}",
                staff_id, clinic_id
            )));
        }
        if !staff.role.is_staff_tier() {
            return Err(PermissionError::NotAuthorized(format!(
                "role {} is not a staff-tier role",
                staff.role
            )));
        }

        let validated = validate_module_permissions(permissions)?;

        let ceiling = self
            .clinic_permissions
            .get(clinic_id, staff.role)
            .await?
            .ok_or_else(|| PermissionError::NoCeilingDefined {
                clinic_id: clinic_id.to_string(),
                role: staff.role,
            })?;

        let clamped = clamp_to_ceiling(&validated, &ceiling.permissions);
        debug!(
            "Delegating to staff {} in clinic {}: {} of {} submitted modules kept",
            staff_id,
            clinic_id,
            clamped.len(),
            validated.len()
        );

        let record = StaffPermission {
            staff_id: staff_id.to_string(),
            clinic_id: clinic_id.to_string(),
            role: staff.role,
            permissions: clamped,
            is_active: true,
            granted_by: granted_by.user_id.clone(),
            last_modified: Utc::now(),
        };
        self.write(&record_key(staff_id, clinic_id), &record)?;
        Ok(record)
    }

    async fn deactivate(&self, staff_id: &str, clinic_id: &str) -> PermissionResult<()> {
        if let Some(mut record) = self.read(&record_key(staff_id, clinic_id))? {
            record.is_active = false;
            record.last_modified = Utc::now();
            self.write(&record_key(staff_id, clinic_id), &record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinic_permissions::SledClinicPermissionStore;
    use crate::directory::SledDirectory;
    use models::accounts::{Clinic, UserAccount};
    use models::actions::ActionSet;
    use models::roles::Role;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        directory: Arc<SledDirectory>,
        clinic_store: Arc<SledClinicPermissionStore>,
        staff_store: SledStaffPermissionStore,
        clinic: Clinic,
        staff: UserAccount,
        admin: Identity,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let directory = Arc::new(SledDirectory::new(&db).unwrap());
        let clinic_store =
            Arc::new(SledClinicPermissionStore::new(&db, directory.clone()).unwrap());
        let staff_store =
            SledStaffPermissionStore::new(&db, directory.clone(), clinic_store.clone()).unwrap();

        let clinic = Clinic::new("Sunrise Dental");
        directory.add_clinic(&clinic).await.unwrap();
        let admin_account = UserAccount::new("Root", "Admin", "root@backoffice.test", Role::Admin);
        directory.add_user(&admin_account).await.unwrap();
        let staff = UserAccount::new("Sam", "Eze", "sam@clinic.test", Role::Staff)
            .with_clinic(&clinic.id);
        directory.add_user(&staff).await.unwrap();

        Fixture {
            _dir: dir,
            directory,
            clinic_store,
            staff_store,
            clinic,
            staff,
            admin: admin_account.identity(),
        }
    }

    fn blogs_ceiling() -> Value {
        json!({
            "module": "Blogs",
            "actions": {"all": false, "create": true, "read": true, "update": false, "delete": false}
        })
    }

    fn clinic_caller(f: &Fixture) -> Identity {
        Identity::new("owner", Role::Clinic).with_clinic(&f.clinic.id)
    }

    #[tokio::test]
    async fn over_broad_submission_is_clamped_to_ceiling() {
        let f = fixture().await;
        f.clinic_store
            .upsert(&f.clinic.id, Role::Staff, &[blogs_ceiling()], &f.admin)
            .await
            .unwrap();

        let submission = json!({
            "module": "Blogs",
            "actions": {"all": false, "create": true, "read": true, "update": true, "delete": false}
        });
        let record = f
            .staff_store
            .upsert(&f.staff.id, &f.clinic.id, &[submission], &clinic_caller(&f))
            .await
            .unwrap();

        assert_eq!(
            record.permissions[0].actions,
            ActionSet {
                all: false,
                create: true,
                read: true,
                update: false,
                delete: false
            }
        );

        // The clamped result is what got persisted, not the submission.
        let stored = f
            .staff_store
            .get(&f.staff.id, &f.clinic.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.permissions[0].actions.update);
    }

    #[tokio::test]
    async fn delegation_without_ceiling_fails() {
        let f = fixture().await;
        let doctor_staff = UserAccount::new("Dee", "Obi", "dee@clinic.test", Role::DoctorStaff)
            .with_clinic(&f.clinic.id);
        f.directory.add_user(&doctor_staff).await.unwrap();

        let err = f
            .staff_store
            .upsert(
                &doctor_staff.id,
                &f.clinic.id,
                &[blogs_ceiling()],
                &clinic_caller(&f),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PermissionError::NoCeilingDefined {
                role: Role::DoctorStaff,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn staff_from_another_clinic_is_rejected() {
        let f = fixture().await;
        let other = Clinic::new("Moonlight Clinic");
        f.directory.add_clinic(&other).await.unwrap();
        let outsider = UserAccount::new("Out", "Sider", "out@other.test", Role::Staff)
            .with_clinic(&other.id);
        f.directory.add_user(&outsider).await.unwrap();

        let err = f
            .staff_store
            .upsert(
                &outsider.id,
                &f.clinic.id,
                &[blogs_ceiling()],
                &clinic_caller(&f),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PermissionError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn non_staff_tier_account_cannot_receive_delegation() {
        let f = fixture().await;
        let doctor = UserAccount::new("Doc", "Ume", "doc@clinic.test", Role::Doctor)
            .with_clinic(&f.clinic.id);
        f.directory.add_user(&doctor).await.unwrap();

        let err = f
            .staff_store
            .upsert(
                &doctor.id,
                &f.clinic.id,
                &[blogs_ceiling()],
                &clinic_caller(&f),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PermissionError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn unknown_staff_member_is_not_found() {
        let f = fixture().await;
        let err = f
            .staff_store
            .upsert(
                "no-such-staff",
                &f.clinic.id,
                &[blogs_ceiling()],
                &clinic_caller(&f),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PermissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn deactivate_hides_record_and_is_idempotent() {
        let f = fixture().await;
        f.clinic_store
            .upsert(&f.clinic.id, Role::Staff, &[blogs_ceiling()], &f.admin)
            .await
            .unwrap();
        f.staff_store
            .upsert(&f.staff.id, &f.clinic.id, &[blogs_ceiling()], &clinic_caller(&f))
            .await
            .unwrap();

        f.staff_store
            .deactivate(&f.staff.id, &f.clinic.id)
            .await
            .unwrap();
        f.staff_store
            .deactivate(&f.staff.id, &f.clinic.id)
            .await
            .unwrap();

        assert!(f
            .staff_store
            .get(&f.staff.id, &f.clinic.id)
            .await
            .unwrap()
            .is_none());
    }
}
