use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/server.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory model artifacts are stored in (and downloaded to).
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
    pub members: Vec<ModelSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    /// File name relative to `models.dir`.
    pub file: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Lowercase hex SHA-256 of the artifact.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl ModelSpec {
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5002
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("modelos_descargados")
}

impl AppConfig {
    /// Reads the YAML file, applies environment overrides and validates.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    /// Overrides `HOST`, `PORT`, `MODEL_DIR` and `MAX_UPLOAD_BYTES` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_override("PORT", &port)?;
        }
        if let Some(limit) = lookup("MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = parse_override("MAX_UPLOAD_BYTES", &limit)?;
        }
        if let Some(dir) = lookup("MODEL_DIR") {
            self.models.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_upload_bytes must be non-zero".into(),
            ));
        }
        if self.models.members.is_empty() {
            return Err(ConfigError::Invalid(
                "models.members must list at least one model".into(),
            ));
        }

        let mut names = HashSet::new();
        for spec in &self.models.members {
            if spec.name.trim().is_empty() {
                return Err(ConfigError::Invalid("model name must not be empty".into()));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate model name {}",
                    spec.name
                )));
            }
            if spec.file.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "model {} has an empty file name",
                    spec.name
                )));
            }
            match (&spec.url, &spec.sha256) {
                (Some(_), None) => {
                    return Err(ConfigError::Invalid(format!(
                        "model {} has a url but no sha256",
                        spec.name
                    )));
                }
                (_, Some(digest)) if !is_sha256_hex(digest) => {
                    return Err(ConfigError::Invalid(format!(
                        "model {} has a malformed sha256",
                        spec.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn is_sha256_hex(digest: &str) -> bool {
    digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
}
