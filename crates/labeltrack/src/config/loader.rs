use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;
use crate::stages::Stage;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Returns the canonical config path: `~/.labeltrack/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".labeltrack").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads the config at `path`, or built-in defaults when the file does not
/// exist. A file that exists but is invalid is still an error.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(
            "No config file at {}, using built-in defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if Stage::parse(&config.resume_fallback_stage).is_none() {
        return Err(ConfigError::Validation {
            message: format!(
                "resumeFallbackStage '{}' is not a production stage",
                config.resume_fallback_stage
            ),
        });
    }

    if config.catalog().is_empty() {
        return Err(ConfigError::Validation {
            message: "catalogUnits must contain at least one non-zero unit".to_string(),
        });
    }

    let mut seen_stages = HashSet::new();
    for (name, machines) in &config.machines {
        let stage = Stage::parse(name).ok_or_else(|| ConfigError::Validation {
            message: format!("machines: '{}' is not a production stage", name),
        })?;
        if !seen_stages.insert(stage) {
            return Err(ConfigError::Validation {
                message: format!("machines: stage {} is listed twice", stage),
            });
        }

        let mut seen_machines = HashSet::new();
        for machine in machines {
            if !seen_machines.insert(machine.as_str()) {
                return Err(ConfigError::Validation {
                    message: format!("machines: '{}' is listed twice for {}", machine, stage),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "databasePath": "/srv/plant/labeltrack.db",
            "catalogUnits": [96, 88, 120],
            "resumeFallbackStage": "Quality-Control",
            "allowStageSkip": false,
            "machines": {
                "Printing": ["SP1", "Nilpeter FA-17"]
            },
            "logging": { "level": "labeltrack=debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.catalog().first().map(|u| u.code), Some(88));
        assert_eq!(config.resume_fallback(), Stage::QualityControl);
        assert!(!config.allow_stage_skip);
        assert_eq!(
            config.sequencer().machine_options(Stage::Printing).len(),
            2
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_schema_rejects_unknown_field() {
        let result = load_config_from_str(r#"{ "version": "1.0", "workerCount": 4 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_empty_catalog() {
        let result = load_config_from_str(r#"{ "version": "1.0", "catalogUnits": [] }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_fallback_stage() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "resumeFallbackStage": "Paused" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_machines_for_unknown_stage() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "machines": { "Lamination": ["L1"] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_same_stage_under_two_names() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "machines": { "Printing": ["SP1"], "Impresion": ["SP1"] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_duplicate_machine() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "machines": { "Printing": ["SP1", "SP1"] } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ version: 1.0 ");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());

        let err = load_config(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "version": "1.0", "allowStageSkip": false }"#).unwrap();
        let config = load_config_or_default(&path).unwrap();
        assert!(!config.allow_stage_skip);
    }
}
