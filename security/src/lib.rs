// security/src/lib.rs
//
// The security-critical half of the back office: resolving an authenticated
// caller's heterogeneous claims to a canonical identity, and answering the
// one question every privileged handler asks: "does identity X have action
// A on module M (optionally sub-module S)?".

pub mod evaluator;
pub mod identity;

pub use evaluator::{Decision, PermissionEvaluator};
pub use identity::{decode_token, resolve_admin, resolve_identity};
