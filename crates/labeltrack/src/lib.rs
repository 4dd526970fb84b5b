pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod stages;
pub mod store;

pub use config::{load_config, load_config_or_default, Config};
pub use db::{default_database_path, Database, DatabaseError};
pub use error::{ConfigError, LabeltrackError, LayoutError, Result, StoreError};
pub use layout::{LayoutCalculator, LayoutMetrics, LayoutSnapshot, LayoutSpec, ZCatalog};
pub use lifecycle::{
    DetailsUpdate, JobLifecycle, LifecycleError, LifecycleWarning, TransitionContext,
    TransitionReport,
};
pub use stages::{ClosureReport, JobState, PauseReason, Stage, StageSequencer};
pub use store::{
    ColorType, Job, JobId, MemoryStore, NewJob, PrintUnit, ProductionStore, SqliteStore,
    StageInterval,
};
