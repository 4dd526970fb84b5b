//! In-process store backed by a `RwLock`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;

use super::model::{
    IntervalId, Job, JobId, NewInterval, NewJob, StageInterval, StoreWrite, WriteBatch,
};
use super::ProductionStore;

#[derive(Debug, Clone, Default)]
struct Tables {
    jobs: BTreeMap<JobId, Job>,
    intervals: Vec<StageInterval>,
    next_job_id: JobId,
    next_interval_id: IntervalId,
}

impl Tables {
    fn next_interval_id(&mut self) -> IntervalId {
        self.next_interval_id += 1;
        self.next_interval_id
    }

    fn open_interval(&mut self, job_id: JobId, interval: &NewInterval) {
        let id = self.next_interval_id();
        self.intervals.push(StageInterval {
            id,
            job_id,
            stage: interval.stage.clone(),
            opened_at: interval.opened_at,
            closed_at: None,
            opened_by: interval.opened_by.clone(),
            machine: interval.machine.clone(),
            closure: Default::default(),
        });
    }

    fn apply(&mut self, write: &StoreWrite) -> Result<(), StoreError> {
        match write {
            StoreWrite::ExpectState {
                job_id,
                state,
                previous_stage,
            } => {
                let stored = self.jobs.get(job_id).ok_or(StoreError::NotFound(*job_id))?;
                if stored.state != *state || stored.previous_stage != *previous_stage {
                    return Err(StoreError::Conflict {
                        job_id: *job_id,
                        expected: state.to_string(),
                        found: stored.state.to_string(),
                    });
                }
            }
            StoreWrite::SaveJob(job) => {
                let stored = self
                    .jobs
                    .get_mut(&job.id)
                    .ok_or(StoreError::NotFound(job.id))?;
                let created_at = stored.created_at;
                *stored = job.clone();
                stored.created_at = created_at;
            }
            StoreWrite::CloseOpenInterval {
                job_id,
                closed_at,
                closure,
            } => {
                for interval in self
                    .intervals
                    .iter_mut()
                    .filter(|i| i.job_id == *job_id && i.is_open())
                {
                    interval.closed_at = Some(*closed_at);
                    interval.closure = closure.clone();
                }
            }
            StoreWrite::AppendInterval { job_id, interval } => {
                if !self.jobs.contains_key(job_id) {
                    return Err(StoreError::NotFound(*job_id));
                }
                self.open_interval(*job_id, interval);
            }
        }
        Ok(())
    }
}

/// Keeps jobs and intervals in memory. Batches are applied to a staged copy
/// and swapped in only when every write succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with [`StoreError::Unavailable`]
    /// until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Inserts an interval as-is, bypassing every check. Used to reproduce
    /// records edited by hand.
    pub fn insert_raw_interval(&self, interval: StageInterval) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.next_interval_id = tables.next_interval_id.max(interval.id);
        tables.intervals.push(interval);
        Ok(())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.check_available()?;
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.check_available()?;
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl ProductionStore for MemoryStore {
    fn load_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.read()?.jobs.get(&id).cloned())
    }

    fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.read()?.jobs.values().cloned().collect())
    }

    fn list_intervals(&self, job_id: JobId) -> Result<Vec<StageInterval>, StoreError> {
        let mut intervals: Vec<StageInterval> = self
            .read()?
            .intervals
            .iter()
            .filter(|i| i.job_id == job_id)
            .cloned()
            .collect();
        intervals.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then(a.id.cmp(&b.id)));
        Ok(intervals)
    }

    fn insert_job(&self, job: &NewJob, first_interval: &NewInterval) -> Result<Job, StoreError> {
        let mut tables = self.write()?;
        tables.next_job_id += 1;
        let stored = Job {
            id: tables.next_job_id,
            customer: job.customer.clone(),
            name: job.name.clone(),
            priority: job.priority,
            state: first_interval.stage.clone(),
            previous_stage: None,
            created_at: first_interval.opened_at,
            order: job.order.clone(),
            technical: job.technical.clone(),
        };
        tables.jobs.insert(stored.id, stored.clone());
        tables.open_interval(stored.id, first_interval);
        Ok(stored)
    }

    fn delete_job(&self, id: JobId) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let existed = tables.jobs.remove(&id).is_some();
        tables.intervals.retain(|i| i.job_id != id);
        Ok(existed)
    }

    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let mut staged = tables.clone();
        for write in batch.writes() {
            staged.apply(write)?;
        }
        *tables = staged;
        Ok(())
    }
}
