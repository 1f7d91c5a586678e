//! Engine configuration (§6), loaded from YAML with environment-variable
//! overrides layered on top.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level configuration recognized by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub administration_directories: HashMap<String, AdministrationDirectory>,
    pub query_directory: QueryDirectorySettings,
    pub exclude_admin_directories: Vec<String>,
    pub directory_resource_types: Vec<String>,
    pub state_file: String,
    pub snapshot_mode_support: bool,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdministrationDirectory {
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDirectorySettings {
    pub base_url: String,
}

/// Opaque bearer-token provider configuration consumed by the FHIR Access
/// Layer (§6). A real OAuth2 client-credentials flow is out of scope; this
/// only covers the common static-token deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub bearer_token: Option<String>,
}

impl EngineConfig {
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env vars > config file > defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };

        if let Ok(port) = std::env::var("MCSD_PORT")
            && let Ok(port_num) = port.parse()
        {
            config.server.port = port_num;
        }
        if let Ok(host) = std::env::var("MCSD_HOST") {
            config.server.host = host;
        }
        if let Ok(state_file) = std::env::var("MCSD_STATE_FILE") {
            config.state_file = state_file;
        }
        if let Ok(query_base) = std::env::var("MCSD_QUERY_DIRECTORY_BASE_URL") {
            config.query_directory.base_url = query_base;
        }
        if let Ok(token) = std::env::var("MCSD_AUTH_BEARER_TOKEN") {
            config.auth.bearer_token = Some(token);
        }

        Ok(config)
    }

    /// §6: default whitelist `{Organization, Endpoint, Location,
    /// HealthcareService, PractitionerRole, Practitioner}` when unset.
    pub fn directory_resource_types_or_default(&self) -> Vec<String> {
        if self.directory_resource_types.is_empty() {
            mcsd_core::constants::DEFAULT_DIRECTORY_RESOURCE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.directory_resource_types.clone()
        }
    }
}
