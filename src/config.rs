// src/config.rs
//! Configuration loading: environment variables, optionally overlaid by config.yaml

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::app_log;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_AI_URL: &str = "https://api.deepseek.com";
const DEFAULT_AI_MODEL: &str = "deepseek-chat";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub service: ServiceConfig,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub database_path: PathBuf,
    pub local_store_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the JD2CV API used by the client features.
    pub api_base_url: String,
    /// OpenAI-compatible chat completions host.
    pub ai_base_url: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub timeout_seconds: u64,
    pub typst_bin: String,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    local: EnvironmentConfig,
    production: EnvironmentConfig,
}

impl ConfigManager {
    /// Load all configurations
    pub fn load() -> Result<Self> {
        let environment = Self::load_environment()?;
        let service = Self::load_service();
        let port = match std::env::var("ROCKET_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("ROCKET_PORT must be a valid port number"))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            environment,
            service,
            port,
        })
    }

    pub fn environment_name() -> String {
        std::env::var("JD2CV_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string())
    }

    fn load_environment() -> Result<EnvironmentConfig> {
        let env = Self::environment_name();
        app_log!(info, "Loading environment configuration for: {}", env);

        let config_path = PathBuf::from("config.yaml");
        if config_path.exists() {
            return Self::load_from_file(&config_path, &env);
        }

        let base_dir = if env == "production" {
            PathBuf::from("/app")
        } else {
            std::env::current_dir().context("Failed to get current directory")?
        };

        let data_path = env_path("JD2CV_DATA_DIR").unwrap_or_else(|| base_dir.join("data"));
        Ok(EnvironmentConfig {
            output_path: env_path("JD2CV_OUTPUT_DIR").unwrap_or_else(|| base_dir.join("out")),
            database_path: env_path("JD2CV_DATABASE_PATH")
                .unwrap_or_else(|| data_path.join("jd2cv.db")),
            local_store_path: env_path("JD2CV_LOCAL_STORE")
                .unwrap_or_else(|| data_path.join("local_store.json")),
            data_path,
        })
    }

    fn load_from_file(config_path: &Path, environment: &str) -> Result<EnvironmentConfig> {
        let content = std::fs::read_to_string(config_path).context("Failed to read config.yaml")?;
        let config_file: ConfigFile =
            serde_yaml::from_str(&content).context("Failed to parse config.yaml")?;

        let env_config = match environment {
            "production" => config_file.production,
            _ => config_file.local,
        };

        Ok(EnvironmentConfig {
            data_path: resolve_path(&env_config.data_path)?,
            output_path: resolve_path(&env_config.output_path)?,
            database_path: resolve_path(&env_config.database_path)?,
            local_store_path: resolve_path(&env_config.local_store_path)?,
        })
    }

    fn load_service() -> ServiceConfig {
        ServiceConfig {
            api_base_url: std::env::var("JD2CV_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            ai_base_url: std::env::var("AI_API_URL").unwrap_or_else(|_| DEFAULT_AI_URL.to_string()),
            ai_api_key: std::env::var("AI_API_KEY").unwrap_or_default(),
            ai_model: std::env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string()),
            timeout_seconds: std::env::var("JD2CV_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            typst_bin: std::env::var("TYPST_BIN").unwrap_or_else(|_| "typst".to_string()),
        }
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        let dirs = [&self.environment.data_path, &self.environment.output_path];
        for dir in dirs {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        for file in [
            &self.environment.database_path,
            &self.environment.local_store_path,
        ] {
            if let Some(parent) = file.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        app_log!(info, "All configured directories ensured to exist");
        Ok(())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(current_dir.join(path))
    }
}
