// models/src/errors.rs

pub use thiserror::Error;

use crate::roles::Role;

/// A validation error raised while checking a submitted permission matrix.
///
/// These are always client errors: the offending key or field is named so the
/// caller can fix the payload, and nothing is retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A permission entry was not a JSON object.
    #[error("permission entry must be a JSON object")]
    EntryNotAnObject,
    /// The module name was missing, empty, or not a string.
    #[error("module name must be a non-empty string")]
    EmptyModuleName,
    /// A sub-module name was missing, empty, or not a string.
    #[error("sub-module name must be a non-empty string")]
    EmptySubModuleName,
    /// The actions field was missing or not a JSON object.
    #[error("actions must be an object with exactly the keys all, create, read, update, delete")]
    ActionsNotAnObject,
    /// One of the five required action keys was absent.
    #[error("actions object is missing required key '{0}'")]
    MissingActionKey(String),
    /// An action flag carried a non-boolean value.
    #[error("action '{0}' must be a boolean")]
    ActionNotBoolean(String),
    /// The actions object carried a key outside the five valid ones.
    #[error("unknown action key '{0}'")]
    UnknownActionKey(String),
    /// The subModules field was present but not an array.
    #[error("subModules must be an array")]
    SubModulesNotAnArray,
    /// A sub-module field carried the wrong JSON type.
    #[error("sub-module field '{0}' has the wrong type")]
    InvalidSubModuleField(&'static str),
    /// A role string did not name one of the six known roles.
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    /// An action string did not name one of the five known actions.
    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

/// Terminal, user-visible failures of the permission subsystem.
///
/// Everything except `Storage` reflects bad input or a genuine authorization
/// gap and maps to a 4xx outcome; none are retried.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A clinic, staff member, or target record is absent.
    #[error("{0} was not found")]
    NotFound(String),
    /// The staff member does not belong to the clinic, or holds the wrong role tier.
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    /// A clinic cannot delegate a capability it has not itself been granted.
    #[error("clinic {clinic_id} holds no active permission record for role {role}; nothing to delegate")]
    NoCeilingDefined { clinic_id: String, role: Role },
    /// The granting identity could not be resolved to a known admin; the write
    /// is refused rather than attributed to an unknown actor.
    #[error("granting identity could not be resolved to a known admin")]
    InvalidActor,
    #[error("storage error: {0}")]
    Storage(String),
    #[cfg(feature = "sled-errors")]
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[cfg(feature = "bincode-errors")]
    #[error(transparent)]
    BincodeDecode(#[from] bincode::error::DecodeError),
    #[cfg(feature = "bincode-errors")]
    #[error(transparent)]
    BincodeEncode(#[from] bincode::error::EncodeError),
}

/// A type alias for a `Result` that returns a `PermissionError` on failure.
pub type PermissionResult<T> = Result<T, PermissionError>;
