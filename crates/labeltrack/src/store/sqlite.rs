//! [`ProductionStore`] on top of the SQLite [`Database`].

use std::path::Path;

use rusqlite::Connection;

use crate::db::{interval_repo, job_repo, Database, DatabaseError};
use crate::error::StoreError;

use super::model::{Job, JobId, NewInterval, NewJob, StageInterval, StoreWrite, WriteBatch};
use super::ProductionStore;

/// Every batch runs in one `BEGIN IMMEDIATE` transaction.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Database::open(path).map(Self::new)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Database::open_in_memory().map(Self::new)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Keeps store-level refusals distinct from database failures when a batch
/// aborts.
enum BatchError {
    Refused(StoreError),
    Database(DatabaseError),
}

impl From<DatabaseError> for BatchError {
    fn from(err: DatabaseError) -> Self {
        BatchError::Database(err)
    }
}

impl ProductionStore for SqliteStore {
    fn load_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.db.with_conn(|conn| job_repo::find_by_id(conn, id))?)
    }

    fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.db.with_conn(job_repo::list)?)
    }

    fn list_intervals(&self, job_id: JobId) -> Result<Vec<StageInterval>, StoreError> {
        Ok(self
            .db
            .with_conn(|conn| interval_repo::list_for_job(conn, job_id))?)
    }

    fn insert_job(&self, job: &NewJob, first_interval: &NewInterval) -> Result<Job, StoreError> {
        let stored = self.db.with_transaction(|tx| {
            let id = job_repo::insert(tx, job, &first_interval.stage, first_interval.opened_at)?;
            interval_repo::insert(tx, id, first_interval)?;
            job_repo::find_by_id(tx, id)
        })?;
        let job = stored.ok_or_else(|| {
            StoreError::Unavailable("inserted job could not be read back".into())
        })?;
        log::debug!("Inserted job {} in state {}", job.id, job.state);
        Ok(job)
    }

    fn delete_job(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(self.db.with_transaction(|tx| job_repo::delete(tx, id))?)
    }

    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        // The transaction closure must return DatabaseError, so a refusal is
        // smuggled out through `refused` and the transaction rolled back.
        let mut refused = None;
        let result = self.db.with_transaction(|tx| {
            for write in batch.writes() {
                match apply(tx, write) {
                    Ok(()) => {}
                    Err(BatchError::Refused(err)) => {
                        let reason = err.to_string();
                        refused = Some(err);
                        return Err(DatabaseError::InvalidRow {
                            table: "jobs",
                            column: "id",
                            reason,
                        });
                    }
                    Err(BatchError::Database(err)) => return Err(err),
                }
            }
            Ok(())
        });

        match (result, refused) {
            (Ok(()), _) => Ok(()),
            (Err(_), Some(err)) => {
                log::debug!("Store batch of {} write(s) refused: {}", batch.len(), err);
                Err(err)
            }
            (Err(err), None) => {
                log::error!("Store batch of {} write(s) rolled back: {}", batch.len(), err);
                Err(err.into())
            }
        }
    }
}

fn apply(tx: &Connection, write: &StoreWrite) -> Result<(), BatchError> {
    match write {
        StoreWrite::ExpectState {
            job_id,
            state,
            previous_stage,
        } => match job_repo::current_state(tx, *job_id)? {
            None => Err(BatchError::Refused(StoreError::NotFound(*job_id))),
            Some((found, found_previous)) if found != *state || found_previous != *previous_stage => {
                Err(BatchError::Refused(StoreError::Conflict {
                    job_id: *job_id,
                    expected: state.to_string(),
                    found: found.to_string(),
                }))
            }
            Some(_) => Ok(()),
        },
        StoreWrite::SaveJob(job) => {
            if job_repo::update(tx, job)? {
                Ok(())
            } else {
                Err(BatchError::Refused(StoreError::NotFound(job.id)))
            }
        }
        StoreWrite::CloseOpenInterval {
            job_id,
            closed_at,
            closure,
        } => {
            let closed = interval_repo::close_open(tx, *job_id, *closed_at, closure)?;
            log::debug!("Closed {} open interval(s) of job {}", closed, job_id);
            Ok(())
        }
        StoreWrite::AppendInterval { job_id, interval } => {
            if job_repo::current_state(tx, *job_id)?.is_none() {
                return Err(BatchError::Refused(StoreError::NotFound(*job_id)));
            }
            interval_repo::insert(tx, *job_id, interval)?;
            Ok(())
        }
    }
}
