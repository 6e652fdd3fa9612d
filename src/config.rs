//! Server configuration read from the environment.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::export::generators::common::get_static_dir;
use crate::export::generators::work_plan::TEMPLATE_FILE;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub template_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl ExportConfig {
    /// Read `TEMPLATE_PATH`, `UPLOADS_DIR`, `HOST`, `PORT` and
    /// `ALLOWED_ORIGINS`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let template_path = var("TEMPLATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| get_static_dir().join(TEMPLATE_FILE));
        let uploads_dir = var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOADS_DIR));
        let host = var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match var("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            template_path,
            uploads_dir,
            host,
            port,
            allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ExportConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExportConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
        assert!(config.template_path.ends_with(TEMPLATE_FILE));
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9090"),
            ("UPLOADS_DIR", "/srv/uploads"),
            ("ALLOWED_ORIGINS", "https://plano.example.org, ,http://localhost:5173"),
        ])
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.uploads_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(
            config.allowed_origins,
            vec!["https://plano.example.org", "http://localhost:5173"]
        );
    }

    #[test]
    fn test_invalid_port() {
        match config_from(&[("PORT", "http")]) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "PORT"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
