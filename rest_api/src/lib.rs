// rest_api/src/lib.rs
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use models::actions::Action;
use models::errors::PermissionError;
use models::identity::Identity;
use models::roles::Role;
use security::{decode_token, resolve_admin, resolve_identity, PermissionEvaluator};
use store::{ClinicPermissionStore, DirectoryStore, StaffPermissionStore};

pub mod config;
pub use crate::config::{load_rest_api_config, RestApiConfig};

/// Installs the single global tracing subscriber for the binary.
///
/// The subscriber also claims the `log` facade, so `log` macros from the
/// store crate flow through it. Nothing else may install a logger; a second
/// call is a no-op rather than a panic.
pub fn init_tracing() {
    if tracing_subscriber::fmt().try_init().is_err() {
        tracing::debug!("tracing subscriber was already installed");
    }
}

// Define the REST API error enum
#[derive(Debug, Error)]
pub enum RestApiError {
    #[error("Missing or invalid bearer token")]
    Unauthorized,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn permission_status(err: &PermissionError) -> StatusCode {
    match err {
        PermissionError::Validation(_) => StatusCode::BAD_REQUEST,
        PermissionError::NotFound(_) => StatusCode::NOT_FOUND,
        PermissionError::NotAuthorized(_) | PermissionError::InvalidActor => StatusCode::FORBIDDEN,
        PermissionError::NoCeilingDefined { .. } => StatusCode::CONFLICT,
        // Storage-layer failures are the only 5xx-class outcomes.
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Implement IntoResponse for RestApiError to convert it into an HTTP response
impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            RestApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            RestApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RestApiError::Permission(err) => (permission_status(err), err.to_string()),
            RestApiError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", e),
            ),
        };

        let body = Json(json!({
            "status": "error",
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

// Shared state for the Axum application
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn DirectoryStore>,
    pub clinic_permissions: Arc<dyn ClinicPermissionStore>,
    pub staff_permissions: Arc<dyn StaffPermissionStore>,
    pub evaluator: Arc<PermissionEvaluator>,
    pub jwt_secret: Arc<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
struct ClinicPermissionQuery {
    role: Option<String>,
    #[serde(default)]
    include_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpsertClinicPermissionsRequest {
    pub role: String,
    pub permissions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertStaffPermissionsRequest {
    pub permissions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPermissionRequest {
    pub module: String,
    pub action: String,
    pub sub_module: Option<String>,
}

fn bearer_claims(state: &AppState, headers: &HeaderMap) -> Result<Value, RestApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .ok_or(RestApiError::Unauthorized)?;
    decode_token(token, &state.jwt_secret).map_err(|_| RestApiError::Unauthorized)
}

// Every caller must resolve to a known account; unresolvable claims fail closed.
async fn resolve_caller(state: &AppState, headers: &HeaderMap) -> Result<Identity, RestApiError> {
    let claims = bearer_claims(state, headers)?;
    resolve_identity(&claims, None, state.directory.as_ref())
        .await?
        .ok_or(RestApiError::Unauthorized)
}

fn require_clinic_access(caller: &Identity, clinic_id: &str) -> Result<(), RestApiError> {
    if caller.role == Role::Admin {
        return Ok(());
    }
    if caller.role == Role::Clinic && caller.clinic_id.as_deref() == Some(clinic_id) {
        return Ok(());
    }
    Err(RestApiError::Permission(PermissionError::NotAuthorized(
        format!("caller does not administer clinic {}", clinic_id),
    )))
}

fn parse_role(role: &str) -> Result<Role, RestApiError> {
    Role::from_str(role)
        .map_err(PermissionError::from)
        .map_err(RestApiError::from)
}

// Handler for GET /api/v1/permissions/clinic/:clinic_id
async fn get_clinic_permissions_handler(
    State(state): State<AppState>,
    Path(clinic_id): Path<String>,
    Query(query): Query<ClinicPermissionQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, RestApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    require_clinic_access(&caller, &clinic_id)?;

    match query.role.as_deref() {
        Some(role) => {
            let role = parse_role(role)?;
            let record = state.clinic_permissions.get(&clinic_id, role).await?;
            Ok(Json(json!({ "status": "success", "permission": record })))
        }
        None => {
            let records = state
                .clinic_permissions
                .get_all(&clinic_id, query.include_admin)
                .await?;
            Ok(Json(json!({ "status": "success", "permissions": records })))
        }
    }
}

// Handler for POST /api/v1/permissions/clinic/:clinic_id
async fn upsert_clinic_permissions_handler(
    State(state): State<AppState>,
    Path(clinic_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpsertClinicPermissionsRequest>,
) -> Result<Json<Value>, RestApiError> {
    let claims = bearer_claims(&state, &headers)?;
    let admin = resolve_admin(&claims, state.directory.as_ref()).await?;
    let role = parse_role(&payload.role)?;

    let record = state
        .clinic_permissions
        .upsert(&clinic_id, role, &payload.permissions, &admin)
        .await?;
    info!(%clinic_id, %role, "clinic permission record upserted");
    Ok(Json(json!({ "status": "success", "permission": record })))
}

// Handler for DELETE /api/v1/permissions/clinic/:clinic_id/:role
async fn deactivate_clinic_permission_handler(
    State(state): State<AppState>,
    Path((clinic_id, role)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, RestApiError> {
    let claims = bearer_claims(&state, &headers)?;
    let _admin = resolve_admin(&claims, state.directory.as_ref()).await?;
    let role = parse_role(&role)?;

    state.clinic_permissions.deactivate(&clinic_id, role).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Permission record for clinic {} role {} deactivated.", clinic_id, role)
    })))
}

// Looks up the staff member and enforces that the caller administers its clinic.
async fn staff_clinic_for_caller(
    state: &AppState,
    caller: &Identity,
    staff_id: &str,
) -> Result<String, RestApiError> {
    let staff = state
        .directory
        .get_user_by_id(staff_id)
        .await?
        .ok_or_else(|| PermissionError::NotFound(format!("staff member {}", staff_id)))?;
    let clinic_id = staff.clinic_id.ok_or_else(|| {
        PermissionError::NotFound(format!("clinic association for staff member {}", staff_id))
    })?;
    require_clinic_access(caller, &clinic_id)?;
    Ok(clinic_id)
}

// Handler for GET /api/v1/permissions/staff/:staff_id
async fn get_staff_permissions_handler(
    State(state): State<AppState>,
    Path(staff_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, RestApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    let clinic_id = staff_clinic_for_caller(&state, &caller, &staff_id).await?;

    let record = state.staff_permissions.get(&staff_id, &clinic_id).await?;
    Ok(Json(json!({ "status": "success", "permission": record })))
}

// Handler for POST /api/v1/permissions/staff/:staff_id
async fn upsert_staff_permissions_handler(
    State(state): State<AppState>,
    Path(staff_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpsertStaffPermissionsRequest>,
) -> Result<Json<Value>, RestApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    let clinic_id = staff_clinic_for_caller(&state, &caller, &staff_id).await?;

    let record = state
        .staff_permissions
        .upsert(&staff_id, &clinic_id, &payload.permissions, &caller)
        .await?;
    info!(%staff_id, %clinic_id, "staff delegation record upserted");
    Ok(Json(json!({ "status": "success", "permission": record })))
}

// Handler for DELETE /api/v1/permissions/staff/:staff_id
async fn deactivate_staff_permission_handler(
    State(state): State<AppState>,
    Path(staff_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, RestApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    let clinic_id = staff_clinic_for_caller(&state, &caller, &staff_id).await?;

    state.staff_permissions.deactivate(&staff_id, &clinic_id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Delegation record for staff member {} deactivated.", staff_id)
    })))
}

// Handler for POST /api/v1/permissions/check
async fn check_permission_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckPermissionRequest>,
) -> Result<Json<Value>, RestApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    let action = Action::from_str(&payload.action)
        .map_err(PermissionError::from)
        .map_err(RestApiError::from)?;

    let decision = state
        .evaluator
        .check(
            &caller,
            &payload.module,
            action,
            payload.sub_module.as_deref(),
        )
        .await?;
    Ok(Json(json!({
        "status": "success",
        "allowed": decision.allowed,
        "reason": decision.reason,
    })))
}

// Handler for the /api/v1/health endpoint
async fn health_check_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "message": "Back-office REST API is healthy" })),
    )
}

// Handler for the /api/v1/version endpoint
async fn version_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "version": env!("CARGO_PKG_VERSION"), "api_level": 1 })),
    )
}

/// Builds the router with every permission endpoint wired to the given state.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/api/v1/health", get(health_check_handler))
        .route("/api/v1/version", get(version_handler))
        .route(
            "/api/v1/permissions/clinic/:clinic_id",
            get(get_clinic_permissions_handler).post(upsert_clinic_permissions_handler),
        )
        .route(
            "/api/v1/permissions/clinic/:clinic_id/:role",
            delete(deactivate_clinic_permission_handler),
        )
        .route(
            "/api/v1/permissions/staff/:staff_id",
            get(get_staff_permissions_handler)
                .post(upsert_staff_permissions_handler)
                .delete(deactivate_staff_permission_handler),
        )
        .route("/api/v1/permissions/check", post(check_permission_handler))
        .with_state(state)
        .layer(cors)
}

// Main function to start the REST API server
pub async fn start_server(
    config: &RestApiConfig,
    state: AppState,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), anyhow::Error> {
    use anyhow::Context;

    let app = app_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid host/port in REST API configuration")?;
    info!("REST API server listening on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
            info!("Received shutdown signal.");
        })
        .await
        .context("REST API server failed to start or run")?;

    info!("REST API server stopped.");
    Ok(())
}
