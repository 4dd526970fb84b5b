//! What an operator reports when a stage is closed.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::sequence::{Stage, StageRuleError};

/// Closure report, one variant per stage that collects its own figures.
///
/// `General` fits any stage and only carries the responsible person and notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClosureReport {
    Design {
        responsible: Option<String>,
        /// Prepress house chosen for the next step.
        prepress_supplier: Option<String>,
        notes: Option<String>,
    },
    Prepress {
        responsible: Option<String>,
        notes: Option<String>,
    },
    Printing {
        responsible: Option<String>,
        spool_code: Option<String>,
        printed_meters: f64,
        scrap_meters: f64,
        notes: Option<String>,
    },
    QualityControl {
        responsible: Option<String>,
        cores_used: u32,
        notes: Option<String>,
    },
    DieCutting {
        responsible: Option<String>,
        /// Die condition, replacement notes.
        notes: Option<String>,
    },
    Dispatch {
        responsible: Option<String>,
        box_count: u32,
        notes: Option<String>,
    },
    General {
        responsible: Option<String>,
        notes: Option<String>,
    },
}

impl Default for ClosureReport {
    fn default() -> Self {
        ClosureReport::General {
            responsible: None,
            notes: None,
        }
    }
}

impl ClosureReport {
    pub fn general(responsible: impl Into<String>) -> Self {
        ClosureReport::General {
            responsible: Some(responsible.into()),
            notes: None,
        }
    }

    /// The stage this report closes, or `None` for a general report.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ClosureReport::Design { .. } => Some(Stage::Design),
            ClosureReport::Prepress { .. } => Some(Stage::Prepress),
            ClosureReport::Printing { .. } => Some(Stage::Printing),
            ClosureReport::QualityControl { .. } => Some(Stage::QualityControl),
            ClosureReport::DieCutting { .. } => Some(Stage::DieCutting),
            ClosureReport::Dispatch { .. } => Some(Stage::Dispatch),
            ClosureReport::General { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.stage() {
            Some(stage) => stage.name(),
            None => "General",
        }
    }

    pub fn prepress_supplier(&self) -> Option<&str> {
        match self {
            ClosureReport::Design {
                prepress_supplier, ..
            } => prepress_supplier.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn validate_quantities(&self) -> Result<(), StageRuleError> {
        if let ClosureReport::Printing {
            printed_meters,
            scrap_meters,
            ..
        } = self
        {
            for (field, value) in [
                ("printed_meters", *printed_meters),
                ("scrap_meters", *scrap_meters),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(StageRuleError::InvalidQuantity { field, value });
                }
            }
        }
        Ok(())
    }

    /// Flattens the report into the columns stored on the interval.
    pub fn to_fields(&self) -> ClosureFields {
        let mut fields = ClosureFields::default();
        match self {
            ClosureReport::Design {
                responsible, notes, ..
            }
            | ClosureReport::Prepress { responsible, notes }
            | ClosureReport::DieCutting { responsible, notes }
            | ClosureReport::General { responsible, notes } => {
                fields.operator = responsible.clone();
                fields.notes = notes.clone();
            }
            ClosureReport::Printing {
                responsible,
                spool_code,
                printed_meters,
                scrap_meters,
                notes,
            } => {
                fields.operator = responsible.clone();
                fields.notes = notes.clone();
                fields.spool_code = spool_code.clone();
                fields.printed_meters = Some(*printed_meters);
                fields.scrap_meters = Some(*scrap_meters);
            }
            ClosureReport::QualityControl {
                responsible,
                cores_used,
                notes,
            } => {
                fields.operator = responsible.clone();
                fields.notes = notes.clone();
                fields.cores_used = Some(*cores_used);
            }
            ClosureReport::Dispatch {
                responsible,
                box_count,
                notes,
            } => {
                fields.operator = responsible.clone();
                fields.notes = notes.clone();
                fields.box_count = Some(*box_count);
            }
        }
        fields
    }
}

/// Columns written on an interval when it is closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printed_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrap_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_count: Option<u32>,
    /// Why the interval ended early (pause reason).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ClosureFields {
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Why production on a job was put on hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PauseReason {
    Breakfast,
    Lunch,
    Dinner,
    EndOfShift,
    Maintenance,
    Other(String),
}

impl PauseReason {
    pub fn parse(input: &str) -> PauseReason {
        match input.trim().to_lowercase().as_str() {
            "breakfast" | "desayuno" => PauseReason::Breakfast,
            "lunch" | "almuerzo" => PauseReason::Lunch,
            "dinner" | "cena" => PauseReason::Dinner,
            "end of shift" | "end-of-shift" | "fin de turno" => PauseReason::EndOfShift,
            "maintenance" | "mantenimiento" => PauseReason::Maintenance,
            _ => PauseReason::Other(input.trim().to_string()),
        }
    }
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::Breakfast => write!(f, "Breakfast"),
            PauseReason::Lunch => write!(f, "Lunch"),
            PauseReason::Dinner => write!(f, "Dinner"),
            PauseReason::EndOfShift => write!(f, "End of shift"),
            PauseReason::Maintenance => write!(f, "Maintenance"),
            PauseReason::Other(reason) => write!(f, "Other: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printing_report_fields() {
        let report = ClosureReport::Printing {
            responsible: Some("luis".into()),
            spool_code: Some("B-204".into()),
            printed_meters: 2790.0,
            scrap_meters: 42.5,
            notes: Some("registro ok".into()),
        };
        let fields = report.to_fields();
        assert_eq!(fields.operator.as_deref(), Some("luis"));
        assert_eq!(fields.spool_code.as_deref(), Some("B-204"));
        assert_eq!(fields.printed_meters, Some(2790.0));
        assert_eq!(fields.scrap_meters, Some(42.5));
        assert_eq!(fields.box_count, None);
        assert_eq!(report.stage(), Some(Stage::Printing));
    }

    #[test]
    fn test_dispatch_and_qc_fields() {
        let dispatch = ClosureReport::Dispatch {
            responsible: None,
            box_count: 12,
            notes: None,
        };
        assert_eq!(dispatch.to_fields().box_count, Some(12));

        let qc = ClosureReport::QualityControl {
            responsible: None,
            cores_used: 8,
            notes: None,
        };
        assert_eq!(qc.to_fields().cores_used, Some(8));
    }

    #[test]
    fn test_negative_scrap_rejected() {
        let report = ClosureReport::Printing {
            responsible: None,
            spool_code: None,
            printed_meters: 100.0,
            scrap_meters: -1.0,
            notes: None,
        };
        assert_eq!(
            report.validate_quantities(),
            Err(StageRuleError::InvalidQuantity {
                field: "scrap_meters",
                value: -1.0
            })
        );
    }

    #[test]
    fn test_design_report_exposes_supplier() {
        let report = ClosureReport::Design {
            responsible: Some("lucas".into()),
            prepress_supplier: Some("IFLEXO".into()),
            notes: None,
        };
        assert_eq!(report.prepress_supplier(), Some("IFLEXO"));
        assert_eq!(ClosureReport::general("x").prepress_supplier(), None);
    }

    #[test]
    fn test_report_json_is_tagged() {
        let report = ClosureReport::QualityControl {
            responsible: Some("eva".into()),
            cores_used: 3,
            notes: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "qualityControl");
        assert_eq!(json["coresUsed"], 3);

        let parsed: ClosureReport =
            serde_json::from_str(r#"{"kind":"dispatch","responsible":null,"boxCount":4,"notes":"pallet 2"}"#)
                .unwrap();
        assert_eq!(parsed.to_fields().box_count, Some(4));
    }

    #[test]
    fn test_pause_reason_parse() {
        assert_eq!(PauseReason::parse("Almuerzo"), PauseReason::Lunch);
        assert_eq!(PauseReason::parse("end of shift"), PauseReason::EndOfShift);
        assert_eq!(
            PauseReason::parse("ink delivery"),
            PauseReason::Other("ink delivery".into())
        );
        assert_eq!(PauseReason::Maintenance.to_string(), "Maintenance");
    }
}
