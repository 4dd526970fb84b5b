//! Persistence boundary for jobs and their stage intervals.
//!
//! [`JobLifecycle`](crate::lifecycle::JobLifecycle) only talks to a
//! [`ProductionStore`]. Two implementations ship with the crate: the SQLite
//! backed [`SqliteStore`] and the in-process [`MemoryStore`] used by tests
//! and dry runs.

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::stages::ClosureFields;

pub mod memory;
pub mod model;
pub mod sqlite;

pub use memory::MemoryStore;
pub use model::{
    ColorType, IntervalId, Job, JobId, NewInterval, NewJob, OrderInfo, PrintUnit, Priority,
    StageInterval, StoreWrite, TechnicalRecord, WriteBatch,
};
pub use sqlite::SqliteStore;

/// Storage operations needed by the job lifecycle.
///
/// Every write goes through [`commit`](ProductionStore::commit), which must
/// apply the whole batch or nothing. The single-write helpers are thin
/// wrappers around it.
pub trait ProductionStore: Send + Sync {
    fn load_job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Intervals of one job ordered by `opened_at`, oldest first.
    fn list_intervals(&self, job_id: JobId) -> Result<Vec<StageInterval>, StoreError>;

    /// Registers a job and opens its first interval in one write. The job's
    /// state and `created_at` come from `first_interval`.
    fn insert_job(&self, job: &NewJob, first_interval: &NewInterval) -> Result<Job, StoreError>;

    /// Removes a job and every interval it owns. Returns false when the job
    /// did not exist.
    fn delete_job(&self, id: JobId) -> Result<bool, StoreError>;

    /// Applies all writes of the batch atomically. An
    /// [`ExpectState`](StoreWrite::ExpectState) that no longer holds aborts
    /// the whole batch, also when the change came from another process.
    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError>;

    fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        self.commit(&StoreWrite::SaveJob(job.clone()).into())
    }

    fn append_interval(&self, job_id: JobId, interval: &NewInterval) -> Result<(), StoreError> {
        self.commit(
            &StoreWrite::AppendInterval {
                job_id,
                interval: interval.clone(),
            }
            .into(),
        )
    }

    fn close_open_interval(
        &self,
        job_id: JobId,
        closed_at: DateTime<Utc>,
        closure: &ClosureFields,
    ) -> Result<(), StoreError> {
        self.commit(
            &StoreWrite::CloseOpenInterval {
                job_id,
                closed_at,
                closure: closure.clone(),
            }
            .into(),
        )
    }

    fn open_intervals(&self, job_id: JobId) -> Result<Vec<StageInterval>, StoreError> {
        Ok(self
            .list_intervals(job_id)?
            .into_iter()
            .filter(StageInterval::is_open)
            .collect())
    }
}
