// store/src/clinic_permissions.rs
use std::sync::Arc;

use async_trait::async_trait;
use bincode::{
    config::{BigEndian, Configuration, Fixint},
    serde::{decode_from_slice, encode_to_vec},
};
use chrono::Utc;
use log::{debug, info};
use serde_json::Value;
use sled::{Db, Tree};

use models::errors::{PermissionError, PermissionResult};
use models::identity::Identity;
use models::permissions::validate_module_permissions;
use models::records::ClinicPermission;
use models::roles::Role;

use crate::bincode_config;
use crate::directory::DirectoryStore;

/// Owns the single source of truth per `(clinic, role)`.
#[async_trait]
pub trait ClinicPermissionStore: Send + Sync + 'static {
    /// Returns the single active record for the pair, or none.
    ///
    /// Role `clinic` also matches a legacy record with a missing role tag.
    async fn get(&self, clinic_id: &str, role: Role) -> PermissionResult<Option<ClinicPermission>>;

    /// Returns every active record for the clinic, excluding role `admin`
    /// unless `include_admin` is set.
    async fn get_all(
        &self,
        clinic_id: &str,
        include_admin: bool,
    ) -> PermissionResult<Vec<ClinicPermission>>;

    /// Validates and atomically replaces-or-inserts the record for the pair.
    ///
    /// `granted_by` must already be resolved to an admin identity; the write
    /// is refused with `InvalidActor` otherwise. A legacy untagged record for
    /// the clinic is backfilled with the current role first, so the new
    /// tagged record cannot collide with it.
    async fn upsert(
        &self,
        clinic_id: &str,
        role: Role,
        permissions: &[Value],
        granted_by: &Identity,
    ) -> PermissionResult<ClinicPermission>;

    /// Soft-deletes the record for the pair. Idempotent; absent records are
    /// not an error.
    async fn deactivate(&self, clinic_id: &str, role: Role) -> PermissionResult<()>;
}

/// Sled-backed implementation of the `ClinicPermissionStore` trait.
///
/// Records live under `"{clinic_id}/{role}"`; a legacy untagged record sits
/// at `"{clinic_id}/"` so one prefix scan covers both.
pub struct SledClinicPermissionStore {
    tree: Tree,
    directory: Arc<dyn DirectoryStore>,
    config: Configuration<BigEndian, Fixint>,
}

fn tagged_key(clinic_id: &str, role: Role) -> Vec<u8> {
    format!("{}/{}", clinic_id, role.as_str()).into_bytes()
}

fn legacy_key(clinic_id: &str) -> Vec<u8> {
    format!("{}/", clinic_id).into_bytes()
}

impl SledClinicPermissionStore {
    /// Opens the "clinic_permissions" tree on the shared database.
    pub fn new(db: &Db, directory: Arc<dyn DirectoryStore>) -> PermissionResult<Self> {
        Ok(Self {
            tree: db.open_tree("clinic_permissions")?,
            directory,
            config: bincode_config(),
        })
    }

    fn read(&self, key: &[u8]) -> PermissionResult<Option<ClinicPermission>> {
        if let Some(bytes) = self.tree.get(key)? {
            let (record, _): (ClinicPermission, usize) =
                decode_from_slice(&bytes, self.config.clone())?;
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    fn write(&self, key: &[u8], record: &ClinicPermission) -> PermissionResult<()> {
        let bytes = encode_to_vec(record, self.config.clone())?;
        self.tree.insert(key, bytes)?;
        Ok(())
    }

    /// Lazily repairs a pre-role record for this clinic by re-keying it under
    /// the role being written.
    ///
    /// Idempotent "set if matching": a second concurrent backfill finds no
    /// legacy record and does nothing. Together with the following upsert this
    /// is two store operations, not one transaction (known, accepted race;
    /// permission writes are rare and admin-only).
    fn backfill_legacy_record(
        &self,
        clinic_id: &str,
        role: Role,
        granted_by: &Identity,
    ) -> PermissionResult<()> {
        let Some(mut legacy) = self.read(&legacy_key(clinic_id))? else {
            return Ok(());
        };
        info!(
            "Backfilling legacy permission record for clinic {} with role {}",
            clinic_id, role
        );
        legacy.role = Some(role);
        legacy.granted_by = granted_by.user_id.clone();
        legacy.is_active = true;

        let bytes = encode_to_vec(&legacy, self.config.clone())?;
        let mut batch = sled::Batch::default();
        batch.remove(legacy_key(clinic_id));
        batch.insert(tagged_key(clinic_id, role), bytes);
        self.tree.apply_batch(batch)?;
        Ok(())
    }
}

#[async_trait]
impl ClinicPermissionStore for SledClinicPermissionStore {
    async fn get(&self, clinic_id: &str, role: Role) -> PermissionResult<Option<ClinicPermission>> {
        if let Some(record) = self.read(&tagged_key(clinic_id, role))? {
            return Ok(record.is_active.then_some(record));
        }
        // Untagged legacy rows predate role tags and count as role "clinic".
        if role == Role::Clinic {
            if let Some(record) = self.read(&legacy_key(clinic_id))? {
                return Ok(record.is_active.then_some(record));
            }
        }
        Ok(None)
    }

    async fn get_all(
        &self,
        clinic_id: &str,
        include_admin: bool,
    ) -> PermissionResult<Vec<ClinicPermission>> {
        let mut records = Vec::new();
        for item in self.tree.scan_prefix(legacy_key(clinic_id)) {
            let (_key, bytes) = item?;
            let (record, _): (ClinicPermission, usize) =
                decode_from_slice(&bytes, self.config.clone())?;
            if !record.is_active {
                continue;
            }
            if record.role() == Role::Admin && !include_admin {
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }

    async fn upsert(
        &self,
        clinic_id: &str,
        role: Role,
        permissions: &[Value],
        granted_by: &Identity,
    ) -> PermissionResult<ClinicPermission> {
        if self.directory.get_clinic(clinic_id).await?.is_none() {
            return Err(PermissionError::NotFound(format!("clinic {}", clinic_id)));
        }
        if granted_by.role != Role::Admin {
            return Err(PermissionError::InvalidActor);
        }
        let validated = validate_module_permissions(permissions)?;

        self.backfill_legacy_record(clinic_id, role, granted_by)?;

        let record = ClinicPermission {
            clinic_id: clinic_id.to_string(),
            role: Some(role),
            permissions: validated,
            is_active: true,
            granted_by: granted_by.user_id.clone(),
            last_modified: Utc::now(),
        };
        self.write(&tagged_key(clinic_id, role), &record)?;
        debug!(
            "Upserted permission record for clinic {} role {} ({} modules)",
            clinic_id,
            role,
            record.permissions.len()
        );
        Ok(record)
    }

    async fn deactivate(&self, clinic_id: &str, role: Role) -> PermissionResult<()> {
        if let Some(mut record) = self.read(&tagged_key(clinic_id, role))? {
            record.is_active = false;
            record.last_modified = Utc::now();
            self.write(&tagged_key(clinic_id, role), &record)?;
        }
        if role == Role::Clinic {
            if let Some(mut record) = self.read(&legacy_key(clinic_id))? {
                record.is_active = false;
                record.last_modified = Utc::now();
                self.write(&legacy_key(clinic_id), &record)?;
            }
        }
        Ok(())
    }
}
