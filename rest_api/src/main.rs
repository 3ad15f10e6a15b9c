// rest_api/src/main.rs
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::sync::oneshot;
use tracing::{error, info};

use rest_api::{init_tracing, load_rest_api_config, start_server, AppState};
use security::PermissionEvaluator;
use store::{BackOfficeStores, ClinicPermissionStore, DirectoryStore, StaffPermissionStore};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();
    init_tracing();

    let config = load_rest_api_config(None).context("Failed to load REST API configuration")?;
    info!(
        "Starting back-office permission API on {}:{}",
        config.host, config.port
    );

    let db = store::open_database(&config.data_directory)
        .context("Failed to open the permission database")?;
    let stores = BackOfficeStores::open(&db).context("Failed to open the permission stores")?;

    let directory: Arc<dyn DirectoryStore> = stores.directory.clone();
    let clinic_permissions: Arc<dyn ClinicPermissionStore> = stores.clinic_permissions.clone();
    let staff_permissions: Arc<dyn StaffPermissionStore> = stores.staff_permissions.clone();
    let evaluator = Arc::new(PermissionEvaluator::new(
        clinic_permissions.clone(),
        staff_permissions.clone(),
    ));

    let state = AppState {
        directory,
        clinic_permissions,
        staff_permissions,
        evaluator,
        jwt_secret: Arc::new(config.jwt_secret.as_bytes().to_vec()),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for the shutdown signal: {}", e);
            return;
        }
        info!("Ctrl-C received, shutting down.");
        let _ = shutdown_tx.send(());
    });

    start_server(&config, state, shutdown_rx).await?;
    Ok(())
}
