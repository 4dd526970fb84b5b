//! Job repository: the `jobs` table and its `job_technical` satellite.
//!
//! Functions take a plain `Connection` so they can run inside a
//! transaction opened by the caller.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, DatabaseError};
use crate::layout::LayoutSnapshot;
use crate::stages::JobState;
use crate::store::{Job, JobId, NewJob, OrderInfo, PrintUnit, Priority, TechnicalRecord};

const SELECT_JOBS: &str = "SELECT j.id, j.customer, j.name, j.priority, j.state, j.previous_stage,
        j.created_at, j.order_number, j.production_order, j.due_date, j.quantity,
        t.material, t.finish, t.label_position, t.core_number, t.quantity_per_core,
        t.layout, t.prepress_supplier, t.die_number, t.plate_number, t.print_units
     FROM jobs j LEFT JOIN job_technical t ON t.job_id = j.id";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A raw joined job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: i64,
    pub customer: String,
    pub name: String,
    pub priority: String,
    pub state: String,
    pub previous_stage: Option<String>,
    pub created_at: String,
    pub order_number: Option<String>,
    pub production_order: Option<String>,
    pub due_date: Option<String>,
    pub quantity: i64,
    pub material: Option<String>,
    pub finish: Option<String>,
    pub label_position: Option<String>,
    pub core_number: Option<String>,
    pub quantity_per_core: Option<u32>,
    pub layout: Option<String>,
    pub prepress_supplier: Option<String>,
    pub die_number: Option<String>,
    pub plate_number: Option<String>,
    pub print_units: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            customer: row.get("customer")?,
            name: row.get("name")?,
            priority: row.get("priority")?,
            state: row.get("state")?,
            previous_stage: row.get("previous_stage")?,
            created_at: row.get("created_at")?,
            order_number: row.get("order_number")?,
            production_order: row.get("production_order")?,
            due_date: row.get("due_date")?,
            quantity: row.get("quantity")?,
            material: row.get("material")?,
            finish: row.get("finish")?,
            label_position: row.get("label_position")?,
            core_number: row.get("core_number")?,
            quantity_per_core: row.get("quantity_per_core")?,
            layout: row.get("layout")?,
            prepress_supplier: row.get("prepress_supplier")?,
            die_number: row.get("die_number")?,
            plate_number: row.get("plate_number")?,
            print_units: row.get("print_units")?,
        })
    }

    pub fn into_job(self) -> Result<Job, DatabaseError> {
        let priority = Priority::parse(&self.priority).unwrap_or_else(|| {
            log::warn!(
                "Unknown priority '{}' for job {}, defaulting to Normal",
                self.priority,
                self.id
            );
            Priority::Normal
        });
        let due_date = self
            .due_date
            .as_deref()
            .map(|d| {
                NaiveDate::parse_from_str(d, DATE_FORMAT).map_err(|e| DatabaseError::InvalidRow {
                    table: "jobs",
                    column: "due_date",
                    reason: format!("'{}': {}", d, e),
                })
            })
            .transpose()?;
        let quantity = u64::try_from(self.quantity).map_err(|_| DatabaseError::InvalidRow {
            table: "jobs",
            column: "quantity",
            reason: format!("negative quantity {}", self.quantity),
        })?;
        let layout = self
            .layout
            .as_deref()
            .map(|json| {
                serde_json::from_str::<LayoutSnapshot>(json).map_err(|e| {
                    DatabaseError::InvalidRow {
                        table: "job_technical",
                        column: "layout",
                        reason: e.to_string(),
                    }
                })
            })
            .transpose()?;
        let print_units = self
            .print_units
            .as_deref()
            .map(|json| {
                serde_json::from_str::<Vec<PrintUnit>>(json).map_err(|e| {
                    DatabaseError::InvalidRow {
                        table: "job_technical",
                        column: "print_units",
                        reason: e.to_string(),
                    }
                })
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Job {
            id: self.id,
            customer: self.customer,
            name: self.name,
            priority,
            state: JobState::parse(&self.state),
            previous_stage: self.previous_stage.as_deref().map(JobState::parse),
            created_at: parse_timestamp(&self.created_at, "jobs", "created_at")?,
            order: OrderInfo {
                order_number: self.order_number,
                production_order: self.production_order,
                due_date,
                quantity,
            },
            technical: TechnicalRecord {
                material: self.material,
                finish: self.finish,
                label_position: self.label_position,
                core_number: self.core_number,
                quantity_per_core: self.quantity_per_core,
                layout,
                prepress_supplier: self.prepress_supplier,
                die_number: self.die_number,
                plate_number: self.plate_number,
                print_units,
            },
        })
    }
}

fn quantity_column(quantity: u64) -> Result<i64, DatabaseError> {
    i64::try_from(quantity).map_err(|_| DatabaseError::InvalidRow {
        table: "jobs",
        column: "quantity",
        reason: format!("{} does not fit in an INTEGER column", quantity),
    })
}

fn layout_column(technical: &TechnicalRecord) -> Result<Option<String>, DatabaseError> {
    technical
        .layout
        .as_ref()
        .map(|snapshot| {
            serde_json::to_string(snapshot).map_err(|e| DatabaseError::InvalidRow {
                table: "job_technical",
                column: "layout",
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Empty unit lists are stored as NULL.
fn print_units_column(technical: &TechnicalRecord) -> Result<Option<String>, DatabaseError> {
    if technical.print_units.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(&technical.print_units)
        .map(Some)
        .map_err(|e| DatabaseError::InvalidRow {
            table: "job_technical",
            column: "print_units",
            reason: e.to_string(),
        })
}

fn upsert_technical(
    conn: &Connection,
    job_id: JobId,
    technical: &TechnicalRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO job_technical (job_id, material, finish, label_position, core_number,
         quantity_per_core, layout, prepress_supplier, die_number, plate_number, print_units)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(job_id) DO UPDATE SET material=?2, finish=?3, label_position=?4,
         core_number=?5, quantity_per_core=?6, layout=?7, prepress_supplier=?8,
         die_number=?9, plate_number=?10, print_units=?11",
        params![
            job_id,
            technical.material,
            technical.finish,
            technical.label_position,
            technical.core_number,
            technical.quantity_per_core,
            layout_column(technical)?,
            technical.prepress_supplier,
            technical.die_number,
            technical.plate_number,
            print_units_column(technical)?,
        ],
    )?;
    Ok(())
}

/// Inserts a job with its technical record and returns the assigned id.
pub fn insert(
    conn: &Connection,
    job: &NewJob,
    state: &JobState,
    created_at: DateTime<Utc>,
) -> Result<JobId, DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (customer, name, priority, state, created_at, order_number,
         production_order, due_date, quantity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            job.customer,
            job.name,
            job.priority.as_str(),
            state.as_str(),
            format_timestamp(created_at),
            job.order.order_number,
            job.order.production_order,
            job.order.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
            quantity_column(job.order.quantity)?,
        ],
    )?;
    let id = conn.last_insert_rowid();
    upsert_technical(conn, id, &job.technical)?;
    Ok(id)
}

/// Overwrites every column except `id` and `created_at`. Returns false when
/// no such job exists.
pub fn update(conn: &Connection, job: &Job) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET customer=?2, name=?3, priority=?4, state=?5, previous_stage=?6,
         order_number=?7, production_order=?8, due_date=?9, quantity=?10
         WHERE id=?1",
        params![
            job.id,
            job.customer,
            job.name,
            job.priority.as_str(),
            job.state.as_str(),
            job.previous_stage.as_ref().map(JobState::as_str),
            job.order.order_number,
            job.order.production_order,
            job.order.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
            quantity_column(job.order.quantity)?,
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    upsert_technical(conn, job.id, &job.technical)?;
    Ok(true)
}

/// State and previous stage of a job, read without the joined columns.
pub fn current_state(
    conn: &Connection,
    id: JobId,
) -> Result<Option<(JobState, Option<JobState>)>, DatabaseError> {
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT state, previous_stage FROM jobs WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(row.map(|(state, previous)| {
        (
            JobState::parse(&state),
            previous.as_deref().map(JobState::parse),
        )
    }))
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: JobId) -> Result<Option<Job>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("{} WHERE j.id = ?1", SELECT_JOBS),
            params![id],
            JobRow::from_row,
        )
        .optional()?;
    row.map(JobRow::into_job).transpose()
}

/// All jobs in id order.
pub fn list(conn: &Connection) -> Result<Vec<Job>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY j.id", SELECT_JOBS))?;
    let rows: Vec<JobRow> = stmt
        .query_map([], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(JobRow::into_job).collect()
}

/// Deletes a job. Intervals and the technical record go with it through
/// `ON DELETE CASCADE`.
pub fn delete(conn: &Connection, id: JobId) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}
