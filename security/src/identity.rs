// security/src/identity.rs
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::Value;

use models::errors::{PermissionError, PermissionResult};
use models::identity::Identity;
use models::roles::Role;
use store::DirectoryStore;

/// One way of digging an identifier (or email) out of a claims document.
///
/// The token-issuing code went through several claim shapes over the years;
/// resolution tries each accessor in order instead of assuming the newest
/// shape, so previously-issued sessions keep working. New shapes are added
/// here, not in the resolution logic.
type ClaimAccessor = fn(&Value) -> Option<&Value>;

fn top_level_id(claims: &Value) -> Option<&Value> {
    claims.get("id")
}
fn user_object_id(claims: &Value) -> Option<&Value> {
    claims.pointer("/user/id")
}
fn user_object_underscore_id(claims: &Value) -> Option<&Value> {
    claims.pointer("/user/_id")
}
fn data_object_id(claims: &Value) -> Option<&Value> {
    claims.pointer("/data/id")
}
fn data_object_underscore_id(claims: &Value) -> Option<&Value> {
    claims.pointer("/data/_id")
}
fn subject(claims: &Value) -> Option<&Value> {
    claims.get("sub")
}

fn top_level_email(claims: &Value) -> Option<&Value> {
    claims.get("email")
}
fn user_object_email(claims: &Value) -> Option<&Value> {
    claims.pointer("/user/email")
}
fn data_object_email(claims: &Value) -> Option<&Value> {
    claims.pointer("/data/email")
}

const ID_ACCESSORS: &[ClaimAccessor] = &[
    top_level_id,
    user_object_id,
    user_object_underscore_id,
    data_object_id,
    data_object_underscore_id,
    subject,
];

const EMAIL_ACCESSORS: &[ClaimAccessor] = &[top_level_email, user_object_email, data_object_email];

fn candidates(claims: &Value, accessors: &[ClaimAccessor]) -> Vec<String> {
    let mut out = Vec::new();
    for accessor in accessors {
        let candidate = match accessor(claims) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

fn account_matches(account: &models::accounts::UserAccount, role: Option<Role>) -> bool {
    account.is_active && role.map_or(true, |r| account.role == r)
}

/// Resolves a verified claims document to a canonical identity.
///
/// Walks every plausible identifier field first, preferring an exact id
/// match, then falls back to email candidates. `role`, when given, restricts
/// the match to accounts holding exactly that role. Returns `Ok(None)` when
/// nothing resolves; callers that require an identity must fail closed.
pub async fn resolve_identity(
    claims: &Value,
    role: Option<Role>,
    directory: &dyn DirectoryStore,
) -> PermissionResult<Option<Identity>> {
    for candidate in candidates(claims, ID_ACCESSORS) {
        if let Some(account) = directory.get_user_by_id(&candidate).await? {
            if account_matches(&account, role) {
                return Ok(Some(account.identity()));
            }
        }
    }
    for candidate in candidates(claims, EMAIL_ACCESSORS) {
        if let Some(account) = directory.get_user_by_email(&candidate).await? {
            if account_matches(&account, role) {
                return Ok(Some(account.identity()));
            }
        }
    }
    Ok(None)
}

/// Resolves the granting identity behind an admin write.
///
/// A write is refused with `InvalidActor` rather than attributed to an
/// unknown actor.
pub async fn resolve_admin(
    claims: &Value,
    directory: &dyn DirectoryStore,
) -> PermissionResult<Identity> {
    resolve_identity(claims, Some(Role::Admin), directory)
        .await?
        .ok_or(PermissionError::InvalidActor)
}

/// Decodes and validates a bearer token into its raw claims document.
///
/// Signature policy is owned by the external token issuer; this only checks
/// the shared secret and expiry before handing the claims to the resolver.
pub fn decode_token(token: &str, secret: &[u8]) -> PermissionResult<Value> {
    let decoding_key = DecodingKey::from_secret(secret);
    let validation = Validation::default();
    decode::<Value>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| PermissionError::NotAuthorized(format!("invalid bearer token: {}", e)))
}
