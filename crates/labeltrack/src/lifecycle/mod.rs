//! Job transitions: create, advance, pause, resume, delete and the explicit
//! edit paths.
//!
//! Every operation validates first and then hands the store a single
//! [`WriteBatch`], so a job is never left with a half-applied move. The batch
//! opens with the state the validation saw; the store refuses it when another
//! writer, possibly another process, moved the job in between. Within one
//! process calls on the same job are also serialized through a per-job lock,
//! and different jobs do not wait on each other.

mod error;
mod locks;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

pub use error::{LifecycleError, LifecycleWarning};

use crate::config::Config;
use crate::error::StoreError;
use crate::layout::LayoutSnapshot;
use crate::stages::{ClosureFields, ClosureReport, JobState, PauseReason, Stage, StageSequencer};
use crate::store::{
    Job, JobId, NewInterval, NewJob, OrderInfo, PrintUnit, Priority, ProductionStore,
    StageInterval, StoreWrite, TechnicalRecord, WriteBatch,
};
use locks::{lock_job, JobLocks};

/// Stage a paused job returns to when no previous stage was recorded.
pub const DEFAULT_RESUME_FALLBACK: Stage = Stage::Printing;

/// Who performs a transition and when.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionContext {
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
}

impl TransitionContext {
    pub fn new(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            actor: Some(actor.into()),
            at,
        }
    }

    pub fn now(actor: impl Into<String>) -> Self {
        Self::new(actor, Utc::now())
    }
}

/// Outcome of a successful transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    pub job: Job,
    pub warnings: Vec<LifecycleWarning>,
}

/// Fields an operator may correct after creation. `None` leaves the value
/// as it is. State and layout are never touched here.
#[derive(Debug, Clone, Default)]
pub struct DetailsUpdate {
    pub customer: Option<String>,
    pub name: Option<String>,
    pub priority: Option<Priority>,
    pub order: Option<OrderInfo>,
    /// Replaces the technical record except for its layout snapshot and
    /// print units.
    pub technical: Option<TechnicalRecord>,
}

pub struct JobLifecycle<S> {
    store: S,
    sequencer: StageSequencer,
    resume_fallback: Stage,
    locks: JobLocks,
}

impl<S: ProductionStore> JobLifecycle<S> {
    pub fn new(store: S, sequencer: StageSequencer) -> Self {
        Self {
            store,
            sequencer,
            resume_fallback: DEFAULT_RESUME_FALLBACK,
            locks: JobLocks::default(),
        }
    }

    /// Sequencer rules and resume fallback taken from `config`.
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store, config.sequencer()).with_resume_fallback(config.resume_fallback())
    }

    pub fn with_resume_fallback(mut self, stage: Stage) -> Self {
        self.resume_fallback = stage;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sequencer(&self) -> &StageSequencer {
        &self.sequencer
    }

    pub fn resume_fallback(&self) -> Stage {
        self.resume_fallback
    }

    // ─── Reads ──────────────────────────────────────────────────────────────

    pub fn job(&self, job_id: JobId) -> Result<Job, LifecycleError> {
        self.store
            .load_job(job_id)?
            .ok_or(LifecycleError::JobNotFound(job_id))
    }

    pub fn jobs(&self) -> Result<Vec<Job>, LifecycleError> {
        Ok(self.store.list_jobs()?)
    }

    /// Intervals of the job, oldest first.
    pub fn history(&self, job_id: JobId) -> Result<Vec<StageInterval>, LifecycleError> {
        self.job(job_id)?;
        Ok(self.store.list_intervals(job_id)?)
    }

    /// Stages the job may advance to right now.
    pub fn next_stages(&self, job: &Job) -> Vec<Stage> {
        self.sequencer.next_candidates(&job.state)
    }

    /// Reports drift on a job without changing anything.
    pub fn audit(&self, job_id: JobId) -> Result<Vec<LifecycleWarning>, LifecycleError> {
        let job = self.job(job_id)?;
        let intervals = self.store.list_intervals(job_id)?;
        let mut warnings = Vec::new();

        if let JobState::Unrecognized(name) = &job.state {
            warnings.push(LifecycleWarning::UnrecognizedStage {
                job_id,
                name: name.clone(),
            });
        }
        for interval in &intervals {
            if let JobState::Unrecognized(name) = &interval.stage {
                warnings.push(LifecycleWarning::UnrecognizedStage {
                    job_id,
                    name: name.clone(),
                });
            }
        }
        match intervals.iter().filter(|i| i.is_open()).count() {
            0 => warnings.push(LifecycleWarning::NoOpenInterval { job_id }),
            1 => {}
            count => warnings.push(LifecycleWarning::MultipleOpenIntervals { job_id, count }),
        }
        Ok(warnings)
    }

    // ─── Transitions ────────────────────────────────────────────────────────

    /// Registers a job in `initial` and opens its first interval.
    pub fn create_job(
        &self,
        job: &NewJob,
        initial: Stage,
        ctx: &TransitionContext,
    ) -> Result<TransitionReport, LifecycleError> {
        let _span = info_span!("create_job", initial = %initial).entered();

        validate_identity(&job.customer, &job.name)?;
        let first = NewInterval {
            stage: initial.into(),
            opened_at: ctx.at,
            opened_by: ctx.actor.clone(),
            machine: None,
        };
        let created = self.store.insert_job(job, &first)?;

        info!(
            job_id = created.id,
            customer = %created.customer,
            "job created in {}",
            initial
        );
        Ok(TransitionReport {
            job: created,
            warnings: Vec::new(),
        })
    }

    /// Moves a job forward to `target`, closing the current interval with
    /// `closure` and opening one for `target` on `machine`.
    pub fn advance(
        &self,
        job_id: JobId,
        target: Stage,
        machine: Option<&str>,
        closure: &ClosureReport,
        ctx: &TransitionContext,
    ) -> Result<TransitionReport, LifecycleError> {
        let _span = info_span!("advance", job_id, to = %target).entered();
        let handle = self.locks.handle(job_id);
        let _guard = lock_job(&handle);

        let mut job = self.job(job_id)?;
        self.check_advance(&job, target)?;
        self.sequencer
            .validate_machine(target, machine)
            .map_err(|e| invalid(&job, target, e.to_string()))?;
        self.sequencer
            .validate_closure(&job.state, closure)
            .map_err(|e| invalid(&job, target, e.to_string()))?;

        let intervals = self.store.list_intervals(job_id)?;
        let mut warnings = Vec::new();
        let mut batch = WriteBatch::from(expect_unchanged(&job));
        let mut fields = closure.to_fields();
        if fields.operator.is_none() {
            fields.operator = ctx.actor.clone();
        }
        plan_close(&job, target, &intervals, ctx, fields, &mut batch, &mut warnings)?;
        batch.push(StoreWrite::AppendInterval {
            job_id,
            interval: NewInterval {
                stage: target.into(),
                opened_at: ctx.at,
                opened_by: ctx.actor.clone(),
                machine: machine.map(String::from),
            },
        });

        let from = std::mem::replace(&mut job.state, target.into());
        if let Some(supplier) = closure.prepress_supplier() {
            debug!(supplier, "recording prepress supplier");
            job.technical.prepress_supplier = Some(supplier.to_string());
        }
        batch.push(StoreWrite::SaveJob(job.clone()));
        self.commit_transition(&batch, job_id, &from, &job.state)?;

        info!(job_id, from = %from, to = %target, machine = ?machine, "job advanced");
        Ok(TransitionReport { job, warnings })
    }

    /// Puts a job on hold, remembering the stage it was in.
    pub fn pause(
        &self,
        job_id: JobId,
        reason: &PauseReason,
        ctx: &TransitionContext,
    ) -> Result<TransitionReport, LifecycleError> {
        let _span = info_span!("pause", job_id, reason = %reason).entered();
        let handle = self.locks.handle(job_id);
        let _guard = lock_job(&handle);

        let mut job = self.job(job_id)?;
        match &job.state {
            JobState::Paused => return Err(invalid(&job, JobState::Paused, "job is already paused")),
            JobState::Unrecognized(name) => {
                warn!(job_id, stage = %name, "pause refused on unrecognized stage");
                return Err(invalid(&job, JobState::Paused, unrecognized_reason(name)));
            }
            JobState::Stage(stage) if self.sequencer.is_terminal(*stage) => {
                return Err(invalid(
                    &job,
                    JobState::Paused,
                    format!("{} is the final stage", stage),
                ));
            }
            JobState::Stage(_) => {}
        }

        let intervals = self.store.list_intervals(job_id)?;
        let mut warnings = Vec::new();
        let mut batch = WriteBatch::from(expect_unchanged(&job));
        let closure = ClosureFields {
            operator: ctx.actor.clone(),
            ..Default::default()
        }
        .with_reason(reason.to_string());
        plan_close(&job, JobState::Paused, &intervals, ctx, closure, &mut batch, &mut warnings)?;
        batch.push(StoreWrite::AppendInterval {
            job_id,
            interval: NewInterval {
                stage: JobState::Paused,
                opened_at: ctx.at,
                opened_by: ctx.actor.clone(),
                machine: None,
            },
        });

        let from = std::mem::replace(&mut job.state, JobState::Paused);
        job.previous_stage = Some(from.clone());
        batch.push(StoreWrite::SaveJob(job.clone()));
        self.commit_transition(&batch, job_id, &from, &job.state)?;

        info!(job_id, from = %from, "job paused");
        Ok(TransitionReport { job, warnings })
    }

    /// Returns a paused job to the stage it was paused in, reopening on the
    /// machine it last used there.
    pub fn resume(
        &self,
        job_id: JobId,
        ctx: &TransitionContext,
    ) -> Result<TransitionReport, LifecycleError> {
        let _span = info_span!("resume", job_id).entered();
        let handle = self.locks.handle(job_id);
        let _guard = lock_job(&handle);

        let mut job = self.job(job_id)?;
        if !job.state.is_paused() {
            return Err(LifecycleError::InvalidTransition {
                job_id,
                from: job.state.to_string(),
                to: job
                    .previous_stage
                    .as_ref()
                    .map(JobState::to_string)
                    .unwrap_or_else(|| "resume".to_string()),
                reason: "job is not paused".to_string(),
            });
        }

        let mut warnings = Vec::new();
        let target = match &job.previous_stage {
            Some(JobState::Stage(stage)) => *stage,
            Some(JobState::Unrecognized(name)) => {
                warnings.push(LifecycleWarning::UnrecognizedStage {
                    job_id,
                    name: name.clone(),
                });
                self.fallback(job_id, &mut warnings)
            }
            Some(JobState::Paused) | None => self.fallback(job_id, &mut warnings),
        };

        let intervals = self.store.list_intervals(job_id)?;
        let machine = intervals
            .iter()
            .rev()
            .filter(|i| i.stage == JobState::Stage(target))
            .find_map(|i| i.machine.clone());

        let mut batch = WriteBatch::from(expect_unchanged(&job));
        let closure = ClosureFields {
            operator: ctx.actor.clone(),
            ..Default::default()
        };
        plan_close(&job, target, &intervals, ctx, closure, &mut batch, &mut warnings)?;
        batch.push(StoreWrite::AppendInterval {
            job_id,
            interval: NewInterval {
                stage: target.into(),
                opened_at: ctx.at,
                opened_by: ctx.actor.clone(),
                machine: machine.clone(),
            },
        });

        let from = std::mem::replace(&mut job.state, target.into());
        job.previous_stage = None;
        batch.push(StoreWrite::SaveJob(job.clone()));
        self.commit_transition(&batch, job_id, &from, &job.state)?;

        info!(job_id, to = %target, machine = ?machine, "job resumed");
        Ok(TransitionReport { job, warnings })
    }

    /// Removes a job and its whole interval history. Irreversible.
    pub fn delete(&self, job_id: JobId) -> Result<(), LifecycleError> {
        let _span = info_span!("delete", job_id).entered();
        {
            let handle = self.locks.handle(job_id);
            let _guard = lock_job(&handle);
            if !self.store.delete_job(job_id)? {
                return Err(LifecycleError::JobNotFound(job_id));
            }
        }
        self.locks.forget(job_id);
        info!(job_id, "job deleted");
        Ok(())
    }

    /// Stores `snapshot` as the job's layout exactly as given.
    pub fn update_layout(
        &self,
        job_id: JobId,
        snapshot: LayoutSnapshot,
    ) -> Result<Job, LifecycleError> {
        let _span = info_span!("update_layout", job_id).entered();
        let handle = self.locks.handle(job_id);
        let _guard = lock_job(&handle);

        let mut job = self.job(job_id)?;
        let mut batch = WriteBatch::from(expect_unchanged(&job));
        job.technical.layout = Some(snapshot);
        batch.push(StoreWrite::SaveJob(job.clone()));
        self.store.commit(&batch)?;
        info!(job_id, "layout snapshot replaced");
        Ok(job)
    }

    pub fn update_details(
        &self,
        job_id: JobId,
        update: &DetailsUpdate,
    ) -> Result<Job, LifecycleError> {
        let _span = info_span!("update_details", job_id).entered();
        let handle = self.locks.handle(job_id);
        let _guard = lock_job(&handle);

        let mut job = self.job(job_id)?;
        let mut batch = WriteBatch::from(expect_unchanged(&job));
        if let Some(customer) = &update.customer {
            job.customer = customer.clone();
        }
        if let Some(name) = &update.name {
            job.name = name.clone();
        }
        if let Some(priority) = update.priority {
            job.priority = priority;
        }
        if let Some(order) = &update.order {
            job.order = order.clone();
        }
        if let Some(technical) = &update.technical {
            let layout = job.technical.layout.take();
            let print_units = std::mem::take(&mut job.technical.print_units);
            job.technical = TechnicalRecord {
                layout,
                print_units,
                ..technical.clone()
            };
        }
        validate_identity(&job.customer, &job.name)?;

        batch.push(StoreWrite::SaveJob(job.clone()));
        self.store.commit(&batch)?;
        info!(job_id, "job details updated");
        Ok(job)
    }

    /// Replaces the per-unit press setup. The job's layout must be stored
    /// first, since its color count bounds the number of units.
    pub fn update_print_config(
        &self,
        job_id: JobId,
        units: Vec<PrintUnit>,
    ) -> Result<Job, LifecycleError> {
        let _span = info_span!("update_print_config", job_id, units = units.len()).entered();
        let handle = self.locks.handle(job_id);
        let _guard = lock_job(&handle);

        let mut job = self.job(job_id)?;
        let color_count = job
            .technical
            .layout
            .as_ref()
            .map(|layout| layout.spec.color_count)
            .ok_or_else(|| {
                LifecycleError::InvalidJob(format!(
                    "job {} has no layout, so its color count is unknown",
                    job_id
                ))
            })?;
        if units.len() > color_count as usize {
            return Err(LifecycleError::InvalidJob(format!(
                "{} print units configured but the layout has {} color(s)",
                units.len(),
                color_count
            )));
        }

        let mut batch = WriteBatch::from(expect_unchanged(&job));
        job.technical.print_units = units;
        batch.push(StoreWrite::SaveJob(job.clone()));
        self.store.commit(&batch)?;
        info!(job_id, color_count, "print configuration replaced");
        Ok(job)
    }

    // ─── Helpers ────────────────────────────────────────────────────────────

    fn check_advance(&self, job: &Job, target: Stage) -> Result<(), LifecycleError> {
        let current = match &job.state {
            JobState::Paused => return Err(invalid(job, target, "job is paused; resume it first")),
            JobState::Unrecognized(name) => {
                warn!(job_id = job.id, stage = %name, "advance refused on unrecognized stage");
                return Err(invalid(job, target, unrecognized_reason(name)));
            }
            JobState::Stage(stage) => *stage,
        };
        if self.sequencer.next_candidates(&job.state).contains(&target) {
            return Ok(());
        }
        let reason = if self.sequencer.is_terminal(current) {
            format!("{} is the final stage", current)
        } else if target.index() <= current.index() {
            "stages only move forward".to_string()
        } else {
            format!(
                "skipping stages is disabled; the next stage is {}",
                Stage::ALL[current.index() + 1]
            )
        };
        Err(invalid(job, target, reason))
    }

    /// Commits a transition batch, reporting a concurrent move as a refused
    /// transition.
    fn commit_transition(
        &self,
        batch: &WriteBatch,
        job_id: JobId,
        from: &JobState,
        to: &JobState,
    ) -> Result<(), LifecycleError> {
        self.store.commit(batch).map_err(|err| match err {
            StoreError::Conflict { found, .. } => {
                warn!(job_id, found = %found, "job moved while the transition was prepared");
                LifecycleError::InvalidTransition {
                    job_id,
                    from: from.to_string(),
                    to: to.to_string(),
                    reason: format!("job was moved to {} by another writer", found),
                }
            }
            other => other.into(),
        })
    }

    fn fallback(&self, job_id: JobId, warnings: &mut Vec<LifecycleWarning>) -> Stage {
        warn!(
            job_id,
            fallback = %self.resume_fallback,
            "paused job has no usable previous stage"
        );
        warnings.push(LifecycleWarning::MissingPreviousStage {
            job_id,
            fallback: self.resume_fallback,
        });
        self.resume_fallback
    }
}

/// Adds the close step for whatever is open. Nothing open is tolerated and
/// reported; several open intervals are all closed.
fn plan_close(
    job: &Job,
    to: impl Into<JobState>,
    intervals: &[StageInterval],
    ctx: &TransitionContext,
    closure: ClosureFields,
    batch: &mut WriteBatch,
    warnings: &mut Vec<LifecycleWarning>,
) -> Result<(), LifecycleError> {
    let open: Vec<&StageInterval> = intervals.iter().filter(|i| i.is_open()).collect();
    if let Some(latest) = open.iter().map(|i| i.opened_at).max() {
        if ctx.at < latest {
            return Err(invalid(
                job,
                to,
                format!(
                    "transition time {} is earlier than the open interval start {}",
                    ctx.at, latest
                ),
            ));
        }
    }

    match open.len() {
        0 => {
            warn!(job_id = job.id, "no open interval to close");
            warnings.push(LifecycleWarning::NoOpenInterval { job_id: job.id });
            return Ok(());
        }
        1 => {}
        count => {
            warn!(job_id = job.id, count, "closing several open intervals");
            warnings.push(LifecycleWarning::MultipleOpenIntervals {
                job_id: job.id,
                count,
            });
        }
    }
    batch.push(StoreWrite::CloseOpenInterval {
        job_id: job.id,
        closed_at: ctx.at,
        closure,
    });
    Ok(())
}

/// Precondition that the job still is where it was read.
fn expect_unchanged(job: &Job) -> StoreWrite {
    StoreWrite::ExpectState {
        job_id: job.id,
        state: job.state.clone(),
        previous_stage: job.previous_stage.clone(),
    }
}

fn invalid(job: &Job, to: impl Into<JobState>, reason: impl Into<String>) -> LifecycleError {
    LifecycleError::InvalidTransition {
        job_id: job.id,
        from: job.state.to_string(),
        to: to.into().to_string(),
        reason: reason.into(),
    }
}

fn unrecognized_reason(name: &str) -> String {
    format!("stage '{}' is not part of the production order", name)
}

fn validate_identity(customer: &str, name: &str) -> Result<(), LifecycleError> {
    if customer.trim().is_empty() {
        return Err(LifecycleError::InvalidJob("customer is required".into()));
    }
    if name.trim().is_empty() {
        return Err(LifecycleError::InvalidJob("job name is required".into()));
    }
    Ok(())
}
