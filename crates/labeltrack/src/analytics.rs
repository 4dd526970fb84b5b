//! Time and state summaries built from jobs and their interval log.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::layout::catalog::round_to;
use crate::stages::{ClosureFields, JobState};
use crate::store::{Job, StageInterval};

/// Length of an interval in minutes, two decimals. Open intervals are
/// measured up to `now`; a clock running backwards yields zero.
pub fn interval_minutes(interval: &StageInterval, now: DateTime<Utc>) -> f64 {
    let end = interval.closed_at.unwrap_or(now);
    let millis = (end - interval.opened_at).num_milliseconds().max(0);
    round_to(millis as f64 / 60_000.0, 2)
}

/// One line of a job's process log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    pub opened_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub minutes: f64,
    pub closure: ClosureFields,
}

pub fn stage_history(intervals: &[StageInterval], now: DateTime<Utc>) -> Vec<HistoryRow> {
    intervals
        .iter()
        .map(|interval| HistoryRow {
            stage: interval.stage.to_string(),
            opened_by: interval.opened_by.clone(),
            machine: interval.machine.clone(),
            opened_at: interval.opened_at,
            closed_at: interval.closed_at,
            minutes: interval_minutes(interval, now),
            closure: interval.closure.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTime {
    pub stage: String,
    pub minutes: f64,
}

/// Total minutes per stage. A stage visited twice (for example around a
/// pause) accumulates. Rows follow production order, then `Paused`, then
/// unrecognized names alphabetically.
pub fn time_per_stage(intervals: &[StageInterval], now: DateTime<Utc>) -> Vec<StageTime> {
    let mut totals: HashMap<&JobState, f64> = HashMap::new();
    for interval in intervals {
        *totals.entry(&interval.stage).or_default() += interval_minutes(interval, now);
    }

    let mut rows: Vec<(&JobState, f64)> = totals.into_iter().collect();
    rows.sort_by(|(a, _), (b, _)| state_rank(a).cmp(&state_rank(b)));
    rows.into_iter()
        .map(|(state, minutes)| StageTime {
            stage: state.to_string(),
            minutes: round_to(minutes, 2),
        })
        .collect()
}

fn state_rank(state: &JobState) -> (usize, &str) {
    match state {
        JobState::Stage(stage) => (stage.index(), ""),
        JobState::Paused => (usize::MAX - 1, ""),
        JobState::Unrecognized(name) => (usize::MAX, name.as_str()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCount {
    pub state: String,
    pub count: usize,
}

/// Number of jobs per state, most populated first, ties by name.
pub fn state_distribution(jobs: &[Job]) -> Vec<StateCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for job in jobs {
        *counts.entry(job.state.to_string()).or_default() += 1;
    }
    let mut rows: Vec<StateCount> = counts
        .into_iter()
        .map(|(state, count)| StateCount { state, count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.state.cmp(&b.state)));
    rows
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::stages::Stage;
    use crate::store::{OrderInfo, Priority, TechnicalRecord};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn interval(stage: JobState, from: i64, to: Option<i64>) -> StageInterval {
        StageInterval {
            id: 0,
            job_id: 1,
            stage,
            opened_at: at(from),
            closed_at: to.map(at),
            opened_by: None,
            machine: None,
            closure: ClosureFields::default(),
        }
    }

    fn job_in(state: JobState) -> Job {
        Job {
            id: 1,
            customer: "acme".into(),
            name: "tag".into(),
            priority: Priority::Normal,
            state,
            previous_stage: None,
            created_at: at(0),
            order: OrderInfo::default(),
            technical: TechnicalRecord::default(),
        }
    }

    #[test]
    fn test_interval_minutes_rounds_to_two_decimals() {
        let closed = interval(Stage::Design.into(), 0, Some(100));
        assert_eq!(interval_minutes(&closed, at(10_000)), 1.67);
    }

    #[test]
    fn test_open_interval_measures_to_now() {
        let open = interval(Stage::Printing.into(), 0, None);
        assert_eq!(interval_minutes(&open, at(90 * 60)), 90.0);
        assert_eq!(interval_minutes(&open, at(-60)), 0.0);
    }

    #[test]
    fn test_time_per_stage_accumulates_repeats() {
        let log = vec![
            interval(Stage::Prepress.into(), 0, Some(600)),
            interval(Stage::Printing.into(), 600, Some(3_000)),
            interval(JobState::Paused, 3_000, Some(4_800)),
            interval(Stage::Printing.into(), 4_800, None),
        ];
        let totals = time_per_stage(&log, at(6_000));
        assert_eq!(
            totals,
            vec![
                StageTime {
                    stage: "Prepress".into(),
                    minutes: 10.0
                },
                StageTime {
                    stage: "Printing".into(),
                    minutes: 60.0
                },
                StageTime {
                    stage: "Paused".into(),
                    minutes: 30.0
                },
            ]
        );
    }

    #[test]
    fn test_time_per_stage_lists_unrecognized_last() {
        let log = vec![
            interval(JobState::parse("Laminado"), 0, Some(60)),
            interval(Stage::Dispatch.into(), 60, Some(120)),
        ];
        let stages: Vec<String> = time_per_stage(&log, at(120))
            .into_iter()
            .map(|row| row.stage)
            .collect();
        assert_eq!(stages, vec!["Dispatch", "Laminado"]);
    }

    #[test]
    fn test_stage_history_rows() {
        let mut printing = interval(Stage::Printing.into(), 0, Some(1_800));
        printing.machine = Some("MARK ANDY".into());
        let rows = stage_history(&[printing], at(5_000));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stage, "Printing");
        assert_eq!(rows[0].machine.as_deref(), Some("MARK ANDY"));
        assert_eq!(rows[0].minutes, 30.0);
    }

    #[test]
    fn test_state_distribution_sorted() {
        let jobs = vec![
            job_in(Stage::Printing.into()),
            job_in(Stage::Design.into()),
            job_in(Stage::Printing.into()),
            job_in(JobState::Paused),
            job_in(Stage::Dispatch.into()),
        ];
        let counts = state_distribution(&jobs);
        assert_eq!(
            counts[0],
            StateCount {
                state: "Printing".into(),
                count: 2
            }
        );
        let rest: Vec<&str> = counts[1..].iter().map(|c| c.state.as_str()).collect();
        assert_eq!(rest, vec!["Design", "Dispatch", "Paused"]);
        assert!(state_distribution(&[]).is_empty());
    }
}
