/// `load_config` module: reads the YAML configuration file, injects the QRZ
/// API key from the environment when the file leaves it out, and validates
/// every section before the CLI binds anything.
///
/// # Responsibilities
/// - Parse the user-supplied YAML into [`CliConfig`]
/// - Fall back to `QRZ_API_KEY` (optionally from a `.env` file) for the secret
/// - Reject endpoint timeouts and pipeline settings the core cannot run with
///
/// # Errors
/// All errors use `anyhow::Error` and name the step that failed; they are
/// surfaced at the CLI boundary.
use anyhow::Result;
use qrz_rtlog_core::config::{EndpointConfig, PipelineConfig};
use qrz_rtlog_core::contract::SourceKind;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// Environment variable consulted when `qrz.api_key` is absent.
pub const API_KEY_ENV: &str = "QRZ_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct QrzSection {
    pub call: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override for the logbook API endpoint.
    #[serde(default)]
    pub url: Option<String>,
}

impl QrzSection {
    /// The API key, guaranteed present after [`load_config`] succeeds.
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub qrz: QrzSection,
    #[serde(default)]
    pub wsjtx: Option<EndpointConfig>,
    #[serde(default)]
    pub n1mm: Option<EndpointConfig>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let file_key = config
        .qrz
        .api_key
        .take()
        .filter(|key| !key.trim().is_empty());
    config.qrz.api_key = match file_key {
        Some(key) => Some(key),
        None => {
            dotenvy::dotenv().ok();
            match env::var(API_KEY_ENV) {
                Ok(key) if !key.trim().is_empty() => {
                    info!(env = API_KEY_ENV, "Using QRZ API key from environment");
                    Some(key)
                }
                _ => {
                    error!(env = API_KEY_ENV, "No QRZ API key in config or environment");
                    return Err(anyhow::anyhow!(
                        "missing QRZ API key: set qrz.api_key or {API_KEY_ENV}"
                    ));
                }
            }
        }
    };

    if config.qrz.call.trim().is_empty() {
        return Err(anyhow::anyhow!("qrz.call must not be empty"));
    }
    if config.wsjtx.is_none() && config.n1mm.is_none() {
        warn!(config_path = ?path_ref, "Neither wsjtx nor n1mm is configured, nothing to monitor");
    }

    for (source, endpoint) in config.endpoints() {
        endpoint.validate()?;
        endpoint.trace_loaded(&source.to_string());
    }
    config.pipeline.validate()?;
    config.pipeline.trace_loaded();
    info!(call = %config.qrz.call, "Configuration loaded");

    Ok(config)
}

impl CliConfig {
    /// Configured endpoints in bind order.
    pub fn endpoints(&self) -> impl Iterator<Item = (SourceKind, &EndpointConfig)> {
        [
            (SourceKind::Wsjtx, self.wsjtx.as_ref()),
            (SourceKind::N1mm, self.n1mm.as_ref()),
        ]
        .into_iter()
        .filter_map(|(source, endpoint)| endpoint.map(|e| (source, e)))
    }
}
