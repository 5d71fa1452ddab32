//! Configuration loading and management
//!
//! Settings come from a YAML file mapping each key to its per-environment
//! values:
//!
//! ```yaml
//! database_url:
//!   development: mongodb://localhost:27017
//!   test: mongodb://localhost:27017
//! database_name:
//!   development: kinship_development
//!   test: kinship_test
//! ```
//!
//! An environment variable named after the upper-cased key always wins over
//! the file. The environment itself is read from `APP_ENV` (default
//! `development`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "`{}' is not set in the environment, and `{}' is not set in the provided config file for this environment",
        .key.to_uppercase(),
        .key.to_lowercase()
    )]
    MissingProperty { key: String },

    #[error(
        "`{}' is not set in the environment, and no config file present at {}",
        .key.to_uppercase(),
        .path.display()
    )]
    MissingFile { key: String, path: PathBuf },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// key -> environment -> value
type ConfigFile = HashMap<String, HashMap<String, String>>;

/// Where a key is looked up after the environment variables
enum Source<'a> {
    File(&'a ConfigFile),
    Missing(&'a Path),
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub database_url: String,
    pub database_name: String,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            database_url: "mongodb://localhost:27017".to_string(),
            database_name: format!("kinship_{DEFAULT_ENVIRONMENT}"),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Current environment name from `APP_ENV`
    pub fn current_environment() -> String {
        std::env::var("APP_ENV")
            .map(|env| env.to_lowercase())
            .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
    }

    /// Load configuration from a YAML file, letting environment variables
    /// override it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, &Self::current_environment(), |name| {
            std::env::var(name).ok()
        })
    }

    /// Load configuration for `environment`, reading overrides through `env`
    pub fn load_with(
        path: impl AsRef<Path>,
        environment: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = match std::fs::read_to_string(path) {
            Ok(content) => Some(serde_yaml::from_str::<ConfigFile>(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let source = match &file {
            Some(file) => Source::File(file),
            None => Source::Missing(path),
        };
        Self::resolve(&source, environment, env)
    }

    /// Load configuration for `environment` from a YAML string, without
    /// environment overrides
    pub fn from_yaml_str(yaml: &str, environment: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        Self::resolve(&Source::File(&file), environment, |_| None)
    }

    fn resolve(
        source: &Source<'_>,
        environment: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| -> Result<Option<String>, ConfigError> {
            if let Some(value) = env(&key.to_uppercase()) {
                return Ok(Some(value));
            }
            match source {
                Source::File(file) => Ok(file
                    .get(key)
                    .and_then(|per_env| per_env.get(environment))
                    .cloned()),
                Source::Missing(path) => Err(ConfigError::MissingFile {
                    key: key.to_string(),
                    path: path.to_path_buf(),
                }),
            }
        };
        let optional = |key: &str| match lookup(key) {
            Ok(value) => Ok(value),
            Err(ConfigError::MissingFile { .. }) => Ok(None),
            Err(e) => Err(e),
        };

        let database_url = lookup("database_url")?.ok_or_else(|| ConfigError::MissingProperty {
            key: "database_url".to_string(),
        })?;
        let database_name = optional("database_name")?
            .unwrap_or_else(|| format!("kinship_{environment}"));
        let log_level = optional("log_level")?.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            environment: environment.to_string(),
            database_url,
            database_name,
            log_level,
        })
    }
}
