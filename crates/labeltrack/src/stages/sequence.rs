use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::closure::ClosureReport;

/// Label stored for a job that is on hold.
pub const PAUSED_LABEL: &str = "Paused";

/// Production stages, in the order a job moves through the plant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Stage {
    #[serde(rename = "Pending-Approval")]
    PendingApproval,
    Design,
    Prepress,
    Printing,
    #[serde(rename = "Quality-Control")]
    QualityControl,
    #[serde(rename = "Die-cutting")]
    DieCutting,
    Dispatch,
    Delivered,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::PendingApproval,
        Stage::Design,
        Stage::Prepress,
        Stage::Printing,
        Stage::QualityControl,
        Stage::DieCutting,
        Stage::Dispatch,
        Stage::Delivered,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::PendingApproval => "Pending-Approval",
            Stage::Design => "Design",
            Stage::Prepress => "Prepress",
            Stage::Printing => "Printing",
            Stage::QualityControl => "Quality-Control",
            Stage::DieCutting => "Die-cutting",
            Stage::Dispatch => "Dispatch",
            Stage::Delivered => "Delivered",
        }
    }

    /// Position in the production order.
    pub fn index(self) -> usize {
        Stage::ALL
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }

    /// Parses canonical names and the plant's legacy labels, ignoring case
    /// and separators.
    pub fn parse(input: &str) -> Option<Stage> {
        let key = normalize(input);
        let stage = match key.as_str() {
            "pendingapproval" | "poraprobar" => Stage::PendingApproval,
            "design" | "diseno" | "diseño" => Stage::Design,
            "prepress" | "preprensa" => Stage::Prepress,
            "printing" | "impresion" | "impresión" => Stage::Printing,
            "qualitycontrol" | "controlcalidad" => Stage::QualityControl,
            "diecutting" | "troquelado" => Stage::DieCutting,
            "dispatch" | "despacho" => Stage::Dispatch,
            "delivered" | "entregado" => Stage::Delivered,
            _ => return None,
        };
        Some(stage)
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown stage '{0}'")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::parse(s).ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// Where a job currently is.
///
/// `Unrecognized` carries stage names that only exist because of manual data
/// edits; such jobs cannot advance until corrected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Stage(Stage),
    Paused,
    Unrecognized(String),
}

impl JobState {
    pub fn parse(input: &str) -> JobState {
        if let Some(stage) = Stage::parse(input) {
            return JobState::Stage(stage);
        }
        match normalize(input).as_str() {
            "paused" | "pausado" => JobState::Paused,
            _ => JobState::Unrecognized(input.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Stage(stage) => stage.name(),
            JobState::Paused => PAUSED_LABEL,
            JobState::Unrecognized(name) => name,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            JobState::Stage(stage) => Some(*stage),
            _ => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, JobState::Paused)
    }
}

impl From<Stage> for JobState {
    fn from(stage: Stage) -> Self {
        JobState::Stage(stage)
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        JobState::parse(&s)
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage-specific input was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageRuleError {
    #[error("stage {stage} requires a machine assignment")]
    MachineRequired { stage: Stage },

    #[error("machine '{machine}' is not available for stage {stage}")]
    UnknownMachine { stage: Stage, machine: String },

    #[error("stage {stage} does not take a machine assignment")]
    MachineNotApplicable { stage: Stage },

    #[error("{report} closure report cannot close stage {stage}")]
    ClosureMismatch { report: &'static str, stage: String },

    #[error("closure field '{field}' must be a non-negative number, got {value}")]
    InvalidQuantity { field: &'static str, value: f64 },
}

/// Lookup table for stage order and stage-specific metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSequencer {
    machines: BTreeMap<Stage, Vec<String>>,
    allow_skip: bool,
}

impl Default for StageSequencer {
    fn default() -> Self {
        let mut machines = BTreeMap::new();
        machines.insert(
            Stage::Printing,
            ["SP1", "FIT 350", "SUPERPRINT", "MARK ANDY"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
        );
        machines.insert(
            Stage::QualityControl,
            (1..=6).map(|i| format!("QC Station {}", i)).collect(),
        );
        machines.insert(Stage::DieCutting, vec!["Flatbed Die Cutter".to_string()]);

        Self {
            machines,
            allow_skip: true,
        }
    }
}

impl StageSequencer {
    pub fn new(machines: BTreeMap<Stage, Vec<String>>, allow_skip: bool) -> Self {
        let machines = machines
            .into_iter()
            .filter(|(_, options)| !options.is_empty())
            .collect();
        Self {
            machines,
            allow_skip,
        }
    }

    /// When false, a job may only move to the immediately following stage.
    pub fn with_allow_skip(mut self, allow_skip: bool) -> Self {
        self.allow_skip = allow_skip;
        self
    }

    /// Replaces the machine list of one stage. An empty list removes the
    /// machine requirement.
    pub fn with_machines(mut self, stage: Stage, machines: Vec<String>) -> Self {
        if machines.is_empty() {
            self.machines.remove(&stage);
        } else {
            self.machines.insert(stage, machines);
        }
        self
    }

    pub fn allows_skip(&self) -> bool {
        self.allow_skip
    }

    pub fn stages(&self) -> &'static [Stage] {
        &Stage::ALL
    }

    /// Stages a job in `state` may advance to, in production order.
    ///
    /// Empty for the terminal stage, for paused jobs and for unrecognized
    /// stage names.
    pub fn next_candidates(&self, state: &JobState) -> Vec<Stage> {
        let Some(stage) = state.stage() else {
            return Vec::new();
        };
        let rest = &Stage::ALL[stage.index() + 1..];
        if self.allow_skip {
            rest.to_vec()
        } else {
            rest.iter().take(1).copied().collect()
        }
    }

    pub fn is_terminal(&self, stage: Stage) -> bool {
        stage == Stage::Delivered
    }

    pub fn requires_machine(&self, stage: Stage) -> bool {
        self.machines.contains_key(&stage)
    }

    pub fn machine_options(&self, stage: Stage) -> &[String] {
        self.machines.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Checks the machine assignment for a stage being entered.
    pub fn validate_machine(
        &self,
        stage: Stage,
        machine: Option<&str>,
    ) -> Result<(), StageRuleError> {
        match (self.requires_machine(stage), machine) {
            (true, None) => Err(StageRuleError::MachineRequired { stage }),
            (true, Some(machine)) => {
                if self.machine_options(stage).iter().any(|m| m == machine) {
                    Ok(())
                } else {
                    Err(StageRuleError::UnknownMachine {
                        stage,
                        machine: machine.to_string(),
                    })
                }
            }
            (false, Some(_)) => Err(StageRuleError::MachineNotApplicable { stage }),
            (false, None) => Ok(()),
        }
    }

    /// Checks that a closure report fits the stage being closed.
    pub fn validate_closure(
        &self,
        closing: &JobState,
        report: &ClosureReport,
    ) -> Result<(), StageRuleError> {
        if let Some(expected) = report.stage() {
            if closing.stage() != Some(expected) {
                return Err(StageRuleError::ClosureMismatch {
                    report: report.kind(),
                    stage: closing.to_string(),
                });
            }
        }
        report.validate_quantities()
    }
}
