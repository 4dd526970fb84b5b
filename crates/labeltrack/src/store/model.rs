//! Records exchanged with a [`ProductionStore`](super::ProductionStore).

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::layout::LayoutSnapshot;
use crate::stages::{ClosureFields, JobState};

pub type JobId = i64;
pub type IntervalId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Normal => "Normal",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }

    /// Accepts the plant's legacy labels as well.
    pub fn parse(input: &str) -> Option<Priority> {
        match input.trim().to_lowercase().as_str() {
            "normal" => Some(Priority::Normal),
            "high" | "alta" => Some(Priority::High),
            "urgent" | "urgente" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sales side of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub quantity: u64,
}

/// Engineering record. `layout` is the snapshot taken when the job was
/// created or explicitly re-stored through the edit path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_per_core: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepress_supplier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub die_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate_number: Option<String>,
    /// One entry per color unit on the press, in station order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub print_units: Vec<PrintUnit>,
}

/// How a color unit's ink is specified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorType {
    /// CMYK process color ("Policromía").
    #[default]
    Process,
    /// Spot color from the Pantone guide.
    Pantone,
}

impl ColorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorType::Process => "Process",
            ColorType::Pantone => "Pantone",
        }
    }

    /// Accepts the plant's legacy labels as well.
    pub fn parse(input: &str) -> Option<ColorType> {
        match input.trim().to_lowercase().as_str() {
            "process" | "policromía" | "policromia" => Some(ColorType::Process),
            "pantone" => Some(ColorType::Pantone),
            _ => None,
        }
    }
}

impl fmt::Display for ColorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Press setup of one color unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintUnit {
    /// Anilox roll mounted on the unit, e.g. `440` or `M`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anilox: Option<String>,
    pub color_type: ColorType,
    /// Ink reference such as `Cyan` or `P-185C`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_code: Option<String>,
}

/// A production order ("proyecto" on the shop floor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub customer: String,
    pub name: String,
    pub priority: Priority,
    pub state: JobState,
    /// Set only while the job is paused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_stage: Option<JobState>,
    pub created_at: DateTime<Utc>,
    pub order: OrderInfo,
    pub technical: TechnicalRecord,
}

/// Everything needed to register a job, before the store assigns an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub customer: String,
    pub name: String,
    pub priority: Priority,
    pub order: OrderInfo,
    pub technical: TechnicalRecord,
}

/// One stay of a job in one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageInterval {
    pub id: IntervalId,
    pub job_id: JobId,
    pub stage: JobState,
    pub opened_at: DateTime<Utc>,
    /// `None` while the job is still in this stage.
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(default)]
    pub closure: ClosureFields,
}

impl StageInterval {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// An interval about to be opened.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInterval {
    pub stage: JobState,
    pub opened_at: DateTime<Utc>,
    pub opened_by: Option<String>,
    pub machine: Option<String>,
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    /// Aborts the batch with [`StoreError::Conflict`](crate::error::StoreError::Conflict)
    /// unless the stored job still has this state and previous stage. Checked
    /// inside the batch's write transaction.
    ExpectState {
        job_id: JobId,
        state: JobState,
        previous_stage: Option<JobState>,
    },
    /// Overwrites every job column except `id` and `created_at`.
    SaveJob(Job),
    /// Closes every open interval of the job.
    CloseOpenInterval {
        job_id: JobId,
        closed_at: DateTime<Utc>,
        closure: ClosureFields,
    },
    AppendInterval { job_id: JobId, interval: NewInterval },
}

/// Writes applied together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<StoreWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: StoreWrite) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn writes(&self) -> &[StoreWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

impl From<StoreWrite> for WriteBatch {
    fn from(write: StoreWrite) -> Self {
        Self {
            writes: vec![write],
        }
    }
}
