//! Production stage order and stage-specific rules.

pub mod closure;
pub mod sequence;

pub use closure::{ClosureFields, ClosureReport, PauseReason};
pub use sequence::{JobState, Stage, StageRuleError, StageSequencer, UnknownStage, PAUSED_LABEL};
