// models/src/actions.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;

/// The five valid keys of an actions object, in canonical order.
pub const ACTION_KEYS: [&str; 5] = ["all", "create", "read", "update", "delete"];

/// A single requested action. `All` is the shorthand meaning every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    All,
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::All => "all",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Action::All),
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(ValidationError::UnknownAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five independent grant flags for one module or sub-module.
///
/// `all = true` implies every other flag at evaluation time without the other
/// flags necessarily being physically set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet {
    pub all: bool,
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

impl ActionSet {
    /// Whether this set grants the given action, honoring the `all` shorthand.
    pub fn permits(&self, action: Action) -> bool {
        if self.all {
            return true;
        }
        match action {
            Action::All => self.all,
            Action::Create => self.create,
            Action::Read => self.read,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    /// Strict parse from a raw JSON value.
    ///
    /// Exactly the five keys must be present, each boolean; anything else is
    /// rejected at write time with the offending key named.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or(ValidationError::ActionsNotAnObject)?;

        for key in object.keys() {
            if !ACTION_KEYS.contains(&key.as_str()) {
                return Err(ValidationError::UnknownActionKey(key.clone()));
            }
        }

        let mut flags = [false; 5];
        for (i, key) in ACTION_KEYS.iter().enumerate() {
            let flag = object
                .get(*key)
                .ok_or_else(|| ValidationError::MissingActionKey(key.to_string()))?;
            flags[i] = flag
                .as_bool()
                .ok_or_else(|| ValidationError::ActionNotBoolean(key.to_string()))?;
        }

        Ok(ActionSet {
            all: flags[0],
            create: flags[1],
            read: flags[2],
            update: flags[3],
            delete: flags[4],
        })
    }
}
