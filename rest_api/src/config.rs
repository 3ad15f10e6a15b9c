// rest_api/src/config.rs

use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8082;
pub const DEFAULT_DATA_DIRECTORY: &str = "/tmp/backoffice_data";

/// Represents the configuration for the REST API server itself.
#[derive(Debug, Clone, Deserialize)]
pub struct RestApiConfig {
    pub host: String,
    pub port: u16,
    pub data_directory: String,
    pub jwt_secret: String,
}

impl Default for RestApiConfig {
    fn default() -> Self {
        RestApiConfig {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            data_directory: DEFAULT_DATA_DIRECTORY.to_string(),
            jwt_secret: "change-me-this-secret-should-come-from-the-environment".to_string(),
        }
    }
}

// Wrapper struct to match the 'rest_api:' key in the YAML config.
#[derive(Debug, Deserialize)]
struct RestApiConfigWrapper {
    rest_api: RestApiConfig,
}

/// Loads the REST API configuration from `rest_api/config.yaml`, falling back
/// to defaults when no file is present. A `JWT_SECRET` environment variable
/// overrides the file in either case.
pub fn load_rest_api_config(config_file_path: Option<PathBuf>) -> Result<RestApiConfig> {
    let default_config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");
    let path_to_use = config_file_path.unwrap_or(default_config_path);

    let mut config = if path_to_use.exists() {
        let config_content = fs::read_to_string(&path_to_use).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read REST API config file {}: {}",
                path_to_use.display(),
                e
            )
        })?;
        let wrapper: RestApiConfigWrapper =
            serde_yaml2::from_str(&config_content).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to parse REST API config file {}: {}",
                    path_to_use.display(),
                    e
                )
            })?;
        wrapper.rest_api
    } else {
        RestApiConfig::default()
    };

    if let Ok(secret) = std::env::var("JWT_SECRET") {
        config.jwt_secret = secret;
    }

    Ok(config)
}
