// store/src/directory.rs
use async_trait::async_trait;
use bincode::{
    config::{BigEndian, Configuration, Fixint},
    serde::{decode_from_slice, encode_to_vec},
};
use log::debug;
use sled::{Db, Tree};

use models::accounts::{Clinic, UserAccount};
use models::errors::PermissionResult;

use crate::bincode_config;

/// Read/write access to the accounts and clinics this subsystem resolves
/// identities against. Reads are what the permission engine needs; writes
/// exist for bootstrap and tests.
#[async_trait]
pub trait DirectoryStore: Send + Sync + 'static {
    /// Adds or replaces an account, keyed by its id.
    async fn add_user(&self, user: &UserAccount) -> PermissionResult<()>;
    /// Adds or replaces a clinic, keyed by its id.
    async fn add_clinic(&self, clinic: &Clinic) -> PermissionResult<()>;
    /// Retrieves an account by its unique id.
    async fn get_user_by_id(&self, id: &str) -> PermissionResult<Option<UserAccount>>;
    /// Retrieves an account by email.
    /// Note: this scans the tree; acceptable because resolution falls back to
    /// email only when no id candidate matched.
    async fn get_user_by_email(&self, email: &str) -> PermissionResult<Option<UserAccount>>;
    /// Retrieves a clinic by its unique id.
    async fn get_clinic(&self, id: &str) -> PermissionResult<Option<Clinic>>;
}

/// Sled-backed implementation of the `DirectoryStore` trait.
pub struct SledDirectory {
    accounts: Tree,
    clinics: Tree,
    config: Configuration<BigEndian, Fixint>,
}

impl SledDirectory {
    /// Opens the "accounts" and "clinics" trees on the shared database.
    pub fn new(db: &Db) -> PermissionResult<Self> {
        Ok(Self {
            accounts: db.open_tree("accounts")?,
            clinics: db.open_tree("clinics")?,
            config: bincode_config(),
        })
    }
}

#[async_trait]
impl DirectoryStore for SledDirectory {
    async fn add_user(&self, user: &UserAccount) -> PermissionResult<()> {
        let bytes = encode_to_vec(user, self.config.clone())?;
        self.accounts.insert(user.id.as_bytes(), bytes)?;
        Ok(())
    }

    async fn add_clinic(&self, clinic: &Clinic) -> PermissionResult<()> {
        let bytes = encode_to_vec(clinic, self.config.clone())?;
        self.clinics.insert(clinic.id.as_bytes(), bytes)?;
        Ok(())
    }

    async fn get_user_by_id(&self, id: &str) -> PermissionResult<Option<UserAccount>> {
        if let Some(bytes) = self.accounts.get(id.as_bytes())? {
            let (user, _): (UserAccount, usize) = decode_from_slice(&bytes, self.config.clone())?;
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    async fn get_user_by_email(&self, email: &str) -> PermissionResult<Option<UserAccount>> {
        debug!("Directory scan for account with email {}", email);
        for item in self.accounts.iter() {
            let (_key, bytes) = item?;
            let (user, _): (UserAccount, usize) = decode_from_slice(&bytes, self.config.clone())?;
            if user.email == email {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    async fn get_clinic(&self, id: &str) -> PermissionResult<Option<Clinic>> {
        if let Some(bytes) = self.clinics.get(id.as_bytes())? {
            let (clinic, _): (Clinic, usize) = decode_from_slice(&bytes, self.config.clone())?;
            Ok(Some(clinic))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::roles::Role;
    use tempfile::TempDir;

    fn open() -> (TempDir, SledDirectory) {
        let dir = TempDir::new().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let directory = SledDirectory::new(&db).unwrap();
        (dir, directory)
    }

    #[tokio::test]
    async fn should_roundtrip_account_by_id_and_email() {
        let (_dir, directory) = open();
        let user = UserAccount::new("Ada", "Okafor", "ada@clinic.test", Role::Clinic);
        directory.add_user(&user).await.unwrap();

        let by_id = directory.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id, user);

        let by_email = directory
            .get_user_by_email("ada@clinic.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn should_return_none_for_unknown_lookups() {
        let (_dir, directory) = open();
        assert!(directory.get_user_by_id("missing").await.unwrap().is_none());
        assert!(directory
            .get_user_by_email("nobody@clinic.test")
            .await
            .unwrap()
            .is_none());
        assert!(directory.get_clinic("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_roundtrip_clinic() {
        let (_dir, directory) = open();
        let clinic = Clinic::new("Sunrise Dental");
        directory.add_clinic(&clinic).await.unwrap();
        let fetched = directory.get_clinic(&clinic.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Sunrise Dental");
    }
}
