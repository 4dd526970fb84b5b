use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::default_database_path;
use crate::layout::{ZCatalog, DEFAULT_UNITS};
use crate::lifecycle::DEFAULT_RESUME_FALLBACK;
use crate::stages::{Stage, StageSequencer};

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    /// Falls back to `~/.labeltrack/data/labeltrack.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_catalog_units")]
    pub catalog_units: Vec<u16>,
    #[serde(default = "default_resume_fallback")]
    pub resume_fallback_stage: String,
    #[serde(default = "default_true")]
    pub allow_stage_skip: bool,
    /// Machine lists keyed by stage name. Listed stages replace the built-in
    /// list; an empty list removes the machine requirement.
    #[serde(default)]
    pub machines: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_catalog_units() -> Vec<u16> {
    DEFAULT_UNITS.to_vec()
}

fn default_resume_fallback() -> String {
    DEFAULT_RESUME_FALLBACK.name().to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            database_path: None,
            catalog_units: default_catalog_units(),
            resume_fallback_stage: default_resume_fallback(),
            allow_stage_skip: true,
            machines: BTreeMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(default_database_path)
    }

    pub fn catalog(&self) -> ZCatalog {
        ZCatalog::from_codes(&self.catalog_units)
    }

    /// The configured fallback, or the built-in one if the name does not
    /// parse. `load_config` rejects such names up front.
    pub fn resume_fallback(&self) -> Stage {
        Stage::parse(&self.resume_fallback_stage).unwrap_or(DEFAULT_RESUME_FALLBACK)
    }

    pub fn sequencer(&self) -> StageSequencer {
        self.machines.iter().fold(
            StageSequencer::default().with_allow_skip(self.allow_stage_skip),
            |sequencer, (name, machines)| match Stage::parse(name) {
                Some(stage) => sequencer.with_machines(stage, machines.clone()),
                None => {
                    log::warn!("Ignoring machines for unknown stage '{}'", name);
                    sequencer
                }
            },
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `labeltrack=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}
