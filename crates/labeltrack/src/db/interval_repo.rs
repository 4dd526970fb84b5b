//! Stage interval repository: the `stage_intervals` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{format_timestamp, parse_timestamp, DatabaseError};
use crate::stages::{ClosureFields, JobState};
use crate::store::{IntervalId, JobId, NewInterval, StageInterval};

/// A raw interval row from the database.
#[derive(Debug, Clone)]
pub struct IntervalRow {
    pub id: i64,
    pub job_id: i64,
    pub stage: String,
    pub opened_at: String,
    pub closed_at: Option<String>,
    pub opened_by: Option<String>,
    pub machine: Option<String>,
    pub operator: Option<String>,
    pub notes: Option<String>,
    pub spool_code: Option<String>,
    pub printed_meters: Option<f64>,
    pub scrap_meters: Option<f64>,
    pub cores_used: Option<u32>,
    pub box_count: Option<u32>,
    pub closure_reason: Option<String>,
}

impl IntervalRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            stage: row.get("stage")?,
            opened_at: row.get("opened_at")?,
            closed_at: row.get("closed_at")?,
            opened_by: row.get("opened_by")?,
            machine: row.get("machine")?,
            operator: row.get("operator")?,
            notes: row.get("notes")?,
            spool_code: row.get("spool_code")?,
            printed_meters: row.get("printed_meters")?,
            scrap_meters: row.get("scrap_meters")?,
            cores_used: row.get("cores_used")?,
            box_count: row.get("box_count")?,
            closure_reason: row.get("closure_reason")?,
        })
    }

    pub fn into_interval(self) -> Result<StageInterval, DatabaseError> {
        let closed_at = self
            .closed_at
            .as_deref()
            .map(|ts| parse_timestamp(ts, "stage_intervals", "closed_at"))
            .transpose()?;
        Ok(StageInterval {
            id: self.id,
            job_id: self.job_id,
            stage: JobState::parse(&self.stage),
            opened_at: parse_timestamp(&self.opened_at, "stage_intervals", "opened_at")?,
            closed_at,
            opened_by: self.opened_by,
            machine: self.machine,
            closure: ClosureFields {
                operator: self.operator,
                notes: self.notes,
                spool_code: self.spool_code,
                printed_meters: self.printed_meters,
                scrap_meters: self.scrap_meters,
                cores_used: self.cores_used,
                box_count: self.box_count,
                reason: self.closure_reason,
            },
        })
    }
}

/// Opens an interval and returns its id.
pub fn insert(
    conn: &Connection,
    job_id: JobId,
    interval: &NewInterval,
) -> Result<IntervalId, DatabaseError> {
    conn.execute(
        "INSERT INTO stage_intervals (job_id, stage, opened_at, opened_by, machine)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            job_id,
            interval.stage.as_str(),
            format_timestamp(interval.opened_at),
            interval.opened_by,
            interval.machine,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Closes every open interval of the job and returns how many were closed.
pub fn close_open(
    conn: &Connection,
    job_id: JobId,
    closed_at: DateTime<Utc>,
    closure: &ClosureFields,
) -> Result<usize, DatabaseError> {
    let closed = conn.execute(
        "UPDATE stage_intervals SET closed_at=?2, operator=?3, notes=?4, spool_code=?5,
         printed_meters=?6, scrap_meters=?7, cores_used=?8, box_count=?9, closure_reason=?10
         WHERE job_id=?1 AND closed_at IS NULL",
        params![
            job_id,
            format_timestamp(closed_at),
            closure.operator,
            closure.notes,
            closure.spool_code,
            closure.printed_meters,
            closure.scrap_meters,
            closure.cores_used,
            closure.box_count,
            closure.reason,
        ],
    )?;
    Ok(closed)
}

/// Intervals of one job, oldest first.
pub fn list_for_job(conn: &Connection, job_id: JobId) -> Result<Vec<StageInterval>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM stage_intervals WHERE job_id = ?1 ORDER BY opened_at, id",
    )?;
    let rows: Vec<IntervalRow> = stmt
        .query_map(params![job_id], IntervalRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(IntervalRow::into_interval).collect()
}
