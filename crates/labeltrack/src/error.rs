use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabeltrackError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] crate::lifecycle::LifecycleError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Rejections raised before any layout value is derived.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Invalid dimension '{field}': {value}")]
    InvalidDimension { field: &'static str, value: f64 },

    #[error("Z unit {0} is not in the cylinder catalog")]
    UnknownUnit(u16),

    #[error("Cylinder catalog is empty")]
    EmptyCatalog,
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not complete the call. Nothing was committed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Job {0} not found in store")]
    NotFound(i64),

    /// The job no longer has the state a batch was prepared against.
    #[error("Job {job_id} is in {found}, expected {expected}")]
    Conflict {
        job_id: i64,
        expected: String,
        found: String,
    },
}

impl From<crate::db::DatabaseError> for StoreError {
    fn from(err: crate::db::DatabaseError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LabeltrackError>;
