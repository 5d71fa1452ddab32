//! Configuration loading from YAML files and environment overrides

use kinship::config::{AppConfig, ConfigError};
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
database_url:
  development: mongodb://localhost:27017
  test: mongodb://db.test:27017
database_name:
  development: kinship_dev
log_level:
  test: debug
"#;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_load_picks_environment_section() {
    let file = config_file(CONFIG);

    let config = AppConfig::load_with(file.path(), "development", no_env).unwrap();
    assert_eq!(config.environment, "development");
    assert_eq!(config.database_url, "mongodb://localhost:27017");
    assert_eq!(config.database_name, "kinship_dev");
    assert_eq!(config.log_level, "info");

    let config = AppConfig::load_with(file.path(), "test", no_env).unwrap();
    assert_eq!(config.database_url, "mongodb://db.test:27017");
    assert_eq!(config.database_name, "kinship_test");
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_environment_variables_override_file() {
    let file = config_file(CONFIG);
    let env: HashMap<&str, &str> = [
        ("DATABASE_URL", "mongodb://override:27017"),
        ("LOG_LEVEL", "warn"),
    ]
    .into_iter()
    .collect();

    let config = AppConfig::load_with(file.path(), "development", |name| {
        env.get(name).map(|v| v.to_string())
    })
    .unwrap();
    assert_eq!(config.database_url, "mongodb://override:27017");
    assert_eq!(config.database_name, "kinship_dev");
    assert_eq!(config.log_level, "warn");
}

#[test]
fn test_missing_property_for_environment() {
    let file = config_file(CONFIG);
    let err = AppConfig::load_with(file.path(), "production", no_env).unwrap_err();
    assert!(matches!(err, ConfigError::MissingProperty { ref key } if key == "database_url"));
}

#[test]
fn test_missing_file_without_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");

    let err = AppConfig::load_with(&path, "development", no_env).unwrap_err();
    assert!(matches!(err, ConfigError::MissingFile { ref key, .. } if key == "database_url"));
    assert_eq!(
        err.to_string(),
        format!(
            "`DATABASE_URL' is not set in the environment, and no config file present at {}",
            path.display()
        )
    );
}

#[test]
fn test_missing_file_with_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");

    let config = AppConfig::load_with(&path, "production", |name| {
        (name == "DATABASE_URL").then(|| "mongodb://prod:27017".to_string())
    })
    .unwrap();
    assert_eq!(config.database_url, "mongodb://prod:27017");
    assert_eq!(config.database_name, "kinship_production");
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let file = config_file("database_url: [unterminated");
    let err = AppConfig::load_with(file.path(), "development", no_env).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_init_tracing_is_repeatable() {
    let config = AppConfig::default();
    kinship::observability::init_tracing(&config);
    assert!(!kinship::observability::init_tracing(&config));
}
