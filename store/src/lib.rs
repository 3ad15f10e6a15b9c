// store/src/lib.rs
//
// Sled-backed document stores for the permission engine: the account/clinic
// directory, the clinic permission store, and the staff delegation store.
// Each store is an async trait plus a sled implementation over a named tree.

use std::path::Path;
use std::sync::Arc;

use bincode::config::{self, BigEndian, Configuration, Fixint};
use log::info;

use models::errors::PermissionResult;

pub mod clinic_permissions;
pub mod directory;
pub mod staff_permissions;

pub use clinic_permissions::{ClinicPermissionStore, SledClinicPermissionStore};
pub use directory::{DirectoryStore, SledDirectory};
pub use staff_permissions::{SledStaffPermissionStore, StaffPermissionStore};

/// Provides a standard bincode configuration shared by every store.
pub(crate) fn bincode_config() -> Configuration<BigEndian, Fixint> {
    config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

/// Opens the backing sled database at the given directory.
pub fn open_database(path: impl AsRef<Path>) -> PermissionResult<sled::Db> {
    let path = path.as_ref();
    info!("Opening permission database at {:?}", path);
    Ok(sled::open(path)?)
}

/// The full set of stores the API layer works with, opened over one database.
pub struct BackOfficeStores {
    pub directory: Arc<SledDirectory>,
    pub clinic_permissions: Arc<SledClinicPermissionStore>,
    pub staff_permissions: Arc<SledStaffPermissionStore>,
}

impl BackOfficeStores {
    pub fn open(db: &sled::Db) -> PermissionResult<Self> {
        let directory = Arc::new(SledDirectory::new(db)?);
        let clinic_permissions = Arc::new(SledClinicPermissionStore::new(db, directory.clone())?);
        let staff_permissions = Arc::new(SledStaffPermissionStore::new(
            db,
            directory.clone(),
            clinic_permissions.clone(),
        )?);
        Ok(BackOfficeStores {
            directory,
            clinic_permissions,
            staff_permissions,
        })
    }
}
