//! Configuration loading and default path resolution.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE: &str = "config/settings";

pub const DEFAULT_CHUNK_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SUMMARY_MODEL: &str = "o4-mini";
pub const DEFAULT_CHUNK_TOKEN_LIMIT: usize = 1500;
pub const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("unable to resolve project directories")]
    MissingProjectDirs,
    #[error(transparent)]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub openai: OpenAiConfig,
    pub warehouse: WarehouseConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    /// API key; usually provided via `TERRAPLAN__OPENAI__API_KEY`.
    #[serde(default)]
    pub api_key: String,
    pub chunk_model: String,
    pub summary_model: String,
    pub chunk_token_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    /// OAuth bearer token for the warehouse REST surface; token minting is
    /// outside this application.
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    pub workers: usize,
}

pub fn load() -> Result<AppConfig, AppConfigError> {
    let default_storage = default_storage_path()?;
    let builder = Config::builder()
        .set_default("server.listen_addr", "127.0.0.1:8080")?
        .set_default(
            "storage.path",
            default_storage.to_string_lossy().to_string(),
        )?
        .set_default("openai.chunk_model", DEFAULT_CHUNK_MODEL)?
        .set_default("openai.summary_model", DEFAULT_SUMMARY_MODEL)?
        .set_default("openai.chunk_token_limit", DEFAULT_CHUNK_TOKEN_LIMIT as i64)?
        .set_default("warehouse.project_id", "landscape-planning-agent")?
        .set_default("warehouse.dataset_id", "landscape_planning")?
        .set_default("warehouse.table_id", "municipalities")?
        .set_default("jobs.workers", DEFAULT_WORKERS as i64)?
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(Environment::with_prefix("TERRAPLAN").separator("__"));

    let cfg = builder.build()?.try_deserialize()?;
    Ok(cfg)
}

pub fn project_dirs() -> Result<ProjectDirs, AppConfigError> {
    ProjectDirs::from("cz", "terraplan", "terraplan").ok_or(AppConfigError::MissingProjectDirs)
}

fn default_storage_path() -> Result<PathBuf, AppConfigError> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}
