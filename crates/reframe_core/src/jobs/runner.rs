//! Sequential execution of queued jobs.
//!
//! The runner knows nothing about what a step does. It hands each step's
//! arguments to a [`StepExecutor`] and records the boolean result in the
//! store, applying the job's halt policy.

use super::errors::{JobError, JobResult};
use super::store::JobStore;
use super::types::{JobStatus, StepArgs, StepStatus};

/// Executes one step of a job and reports whether it succeeded.
pub trait StepExecutor {
    fn execute_step(&mut self, job_id: &str, step_index: usize, args: &StepArgs) -> bool;
}

impl<F> StepExecutor for F
where
    F: FnMut(&str, usize, &StepArgs) -> bool,
{
    fn execute_step(&mut self, job_id: &str, step_index: usize, args: &StepArgs) -> bool {
        self(job_id, step_index, args)
    }
}

/// Drives queued jobs through an executor, one step at a time.
pub struct JobRunner<'a> {
    store: &'a mut JobStore,
}

impl<'a> JobRunner<'a> {
    pub fn new(store: &'a mut JobStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &JobStore {
        self.store
    }

    /// Run a queued job.
    ///
    /// Steps already completed (after a retry) are skipped. Under the halt
    /// policy the first failing step fails the job and leaves the remaining
    /// steps pending. Under the continue policy every step runs and the job
    /// fails if any of them failed.
    pub fn run_job<E>(&mut self, job_id: &str, executor: &mut E) -> JobResult<bool>
    where
        E: StepExecutor + ?Sized,
    {
        let job = self
            .store
            .job(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if job.status != JobStatus::Queued {
            return Err(JobError::invalid_state(job_id, job.status, "run"));
        }

        if job.steps.is_empty() {
            tracing::warn!("Job '{}' has no steps", job_id);
            self.store.fail_job(job_id)?;
            return Ok(false);
        }

        let halt_on_error = job.halt_on_error;
        let step_total = job.step_total();
        let remaining: Vec<(usize, StepArgs)> = job
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.status != StepStatus::Completed)
            .map(|(index, step)| (index, step.args.clone()))
            .collect();

        tracing::info!(
            "Running job '{}' ({} of {} steps remaining)",
            job_id,
            remaining.len(),
            step_total
        );

        for (index, args) in remaining {
            tracing::debug!("Job '{}' step {}/{}", job_id, index + 1, step_total);
            let success = executor.execute_step(job_id, index, &args);
            self.store.mark_step_result(job_id, index, success)?;

            if !success {
                tracing::warn!("Job '{}' step {} failed", job_id, index + 1);
                if halt_on_error {
                    return Ok(false);
                }
            }
        }

        let has_failed_step = self
            .store
            .job(job_id)
            .map_or(false, |job| job.has_failed_step());

        if has_failed_step {
            self.store.fail_job(job_id)?;
            tracing::info!("Job '{}' failed", job_id);
            Ok(false)
        } else {
            self.store.complete_job(job_id)?;
            tracing::info!("Job '{}' completed", job_id);
            Ok(true)
        }
    }

    /// Run every queued job in creation order.
    ///
    /// Returns false when nothing was queued or any job failed. With
    /// `halt_on_error` the sweep stops at the first failed job.
    pub fn run_all_queued<E>(&mut self, executor: &mut E, halt_on_error: bool) -> bool
    where
        E: StepExecutor + ?Sized,
    {
        let ids = self.store.job_ids(Some(JobStatus::Queued));
        self.sweep(&ids, halt_on_error, |runner, id| runner.run_job(id, executor))
    }

    /// Re-queue a failed job and run the steps that did not complete.
    pub fn retry_job<E>(&mut self, job_id: &str, executor: &mut E) -> JobResult<bool>
    where
        E: StepExecutor + ?Sized,
    {
        self.store.requeue_failed(job_id)?;
        self.run_job(job_id, executor)
    }

    /// Retry every failed job. Same sweep rules as
    /// [`run_all_queued`](Self::run_all_queued).
    pub fn retry_all_failed<E>(&mut self, executor: &mut E, halt_on_error: bool) -> bool
    where
        E: StepExecutor + ?Sized,
    {
        let ids = self.store.job_ids(Some(JobStatus::Failed));
        self.sweep(&ids, halt_on_error, |runner, id| runner.retry_job(id, executor))
    }

    fn sweep<F>(&mut self, ids: &[String], halt_on_error: bool, mut action: F) -> bool
    where
        F: FnMut(&mut Self, &str) -> JobResult<bool>,
    {
        if ids.is_empty() {
            return false;
        }

        let mut all_succeeded = true;
        for id in ids {
            let succeeded = match action(self, id) {
                Ok(succeeded) => succeeded,
                Err(e) => {
                    tracing::warn!("{}", e);
                    false
                }
            };
            if !succeeded {
                all_succeeded = false;
                if halt_on_error {
                    return false;
                }
            }
        }
        all_succeeded
    }
}
