//! Durable job store with lifecycle transitions.
//!
//! Jobs are held in memory in creation order and persisted as
//! `<jobs_path>/<status>/<job_id>.json`. A status change moves the file.
//! Every mutation is applied to a copy, written to disk, and only then
//! swapped into memory, so a failed write leaves the store unchanged.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::errors::{JobError, JobResult};
use super::list::JobList;
use super::types::{Job, JobStatus, Step, StepArgs, StepStatus};

#[derive(Debug)]
pub struct JobStore {
    jobs: Vec<Job>,
    /// `None` for in-memory stores.
    jobs_path: Option<PathBuf>,
}

impl JobStore {
    /// Open (or initialize) a store rooted at `jobs_path`.
    ///
    /// Creates one folder per status and loads every readable job file.
    /// Unreadable files are skipped with a warning.
    pub fn open(jobs_path: impl Into<PathBuf>) -> JobResult<Self> {
        let jobs_path = jobs_path.into();
        let mut jobs: Vec<Job> = Vec::new();

        for status in JobStatus::ALL {
            let dir = jobs_path.join(status.as_str());
            fs::create_dir_all(&dir)
                .map_err(|e| JobError::io(format!("creating {}", dir.display()), e))?;

            let entries = fs::read_dir(&dir)
                .map_err(|e| JobError::io(format!("reading {}", dir.display()), e))?;

            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                let mut job = match load_job_file(&path) {
                    Ok(job) => job,
                    Err(e) => {
                        tracing::warn!("Skipping job file {}: {}", path.display(), e);
                        continue;
                    }
                };

                if jobs.iter().any(|j| j.id == job.id) {
                    tracing::warn!("Duplicate job '{}' in {}, ignoring", job.id, path.display());
                    continue;
                }

                // The folder is authoritative for status.
                if job.status != status {
                    tracing::warn!(
                        "Job '{}' records status {} but lives in {}",
                        job.id,
                        job.status,
                        status
                    );
                    job.status = status;
                }
                jobs.push(job);
            }
        }

        jobs.sort_by(|a, b| {
            a.date_created
                .cmp(&b.date_created)
                .then_with(|| a.id.cmp(&b.id))
        });

        tracing::info!("Loaded {} jobs from {}", jobs.len(), jobs_path.display());

        Ok(Self {
            jobs,
            jobs_path: Some(jobs_path),
        })
    }

    /// Create a store without persistence (for testing).
    pub fn in_memory() -> Self {
        Self {
            jobs: Vec::new(),
            jobs_path: None,
        }
    }

    pub fn jobs_path(&self) -> Option<&Path> {
        self.jobs_path.as_deref()
    }

    /// All jobs in creation order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == job_id)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.job(job_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Ids of jobs in creation order, optionally filtered by status.
    pub fn job_ids(&self, status: Option<JobStatus>) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .map(|j| j.id.clone())
            .collect()
    }

    pub fn step_total(&self, job_id: &str) -> JobResult<usize> {
        self.job(job_id)
            .map(Job::step_total)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Create an empty drafted job. Creating an existing id is an error.
    pub fn create_job(&mut self, job_id: &str) -> JobResult<()> {
        validate_job_id(job_id)?;
        if self.contains(job_id) {
            return Err(JobError::AlreadyExists(job_id.to_string()));
        }

        let job = Job::new(job_id);
        self.persist(&job, None)?;
        self.jobs.push(job);

        tracing::debug!("Created job '{}'", job_id);
        Ok(())
    }

    /// Choose between halting at the first failed step and attempting all.
    pub fn set_halt_on_error(&mut self, job_id: &str, halt_on_error: bool) -> JobResult<()> {
        self.update(job_id, "change the error policy of", &[JobStatus::Drafted], |job| {
            job.halt_on_error = halt_on_error;
            Ok(())
        })
    }

    pub fn add_step(&mut self, job_id: &str, args: StepArgs) -> JobResult<()> {
        self.update(job_id, "add a step to", &[JobStatus::Drafted], |job| {
            job.steps.push(Step::new(args));
            Ok(())
        })
    }

    /// Insert a step before `index`. Negative indices count from the end;
    /// an index equal to the step count appends.
    pub fn insert_step(&mut self, job_id: &str, index: isize, args: StepArgs) -> JobResult<()> {
        self.update(job_id, "insert a step into", &[JobStatus::Drafted], |job| {
            let position = resolve_insert_index(job.steps.len(), index)
                .ok_or_else(|| JobError::step_out_of_range(&job.id, index))?;
            job.steps.insert(position, Step::new(args));
            Ok(())
        })
    }

    /// Replace the step at `index` with a fresh pending step.
    pub fn remix_step(&mut self, job_id: &str, index: isize, args: StepArgs) -> JobResult<()> {
        self.update(job_id, "remix a step of", &[JobStatus::Drafted], |job| {
            let position = resolve_step_index(job.steps.len(), index)
                .ok_or_else(|| JobError::step_out_of_range(&job.id, index))?;
            job.steps[position] = Step::new(args);
            Ok(())
        })
    }

    /// Append a step that takes the output of step `index` as its target.
    pub fn chain_step(&mut self, job_id: &str, index: isize, args: StepArgs) -> JobResult<()> {
        self.update(job_id, "chain a step onto", &[JobStatus::Drafted], |job| {
            let position = resolve_step_index(job.steps.len(), index)
                .ok_or_else(|| JobError::step_out_of_range(&job.id, index))?;
            let output_path = job.steps[position]
                .args
                .get("output_path")
                .cloned()
                .ok_or_else(|| {
                    JobError::invalid_state(&job.id, job.status, "chain from a step without output_path in")
                })?;

            let mut args = args;
            args.insert("target_path", output_path);
            job.steps.push(Step::new(args));
            Ok(())
        })
    }

    pub fn remove_step(&mut self, job_id: &str, index: isize) -> JobResult<()> {
        self.update(job_id, "remove a step from", &[JobStatus::Drafted], |job| {
            let position = resolve_step_index(job.steps.len(), index)
                .ok_or_else(|| JobError::step_out_of_range(&job.id, index))?;
            job.steps.remove(position);
            Ok(())
        })
    }

    /// Drafted → Queued. A job without steps cannot be submitted.
    pub fn submit_job(&mut self, job_id: &str) -> JobResult<()> {
        self.update(job_id, "submit", &[JobStatus::Drafted], |job| {
            if job.steps.is_empty() {
                return Err(JobError::NoSteps(job.id.clone()));
            }
            for step in &mut job.steps {
                step.status = StepStatus::Pending;
            }
            job.status = JobStatus::Queued;
            Ok(())
        })?;

        tracing::debug!("Submitted job '{}'", job_id);
        Ok(())
    }

    /// Submit every drafted job.
    ///
    /// With `halt_on_error` the first failure stops the sweep. Otherwise all
    /// are attempted. Returns true only if there was at least one drafted
    /// job and every attempted submit succeeded.
    pub fn submit_all(&mut self, halt_on_error: bool) -> bool {
        let ids = self.job_ids(Some(JobStatus::Drafted));
        sweep(&ids, halt_on_error, |id| self.submit_job(id))
    }

    /// Delete a job in any status.
    pub fn delete_job(&mut self, job_id: &str) -> JobResult<()> {
        let index = self.position(job_id)?;
        let status = self.jobs[index].status;
        self.remove_file(status, job_id)?;
        self.jobs.remove(index);

        tracing::debug!("Deleted job '{}'", job_id);
        Ok(())
    }

    /// Delete every completed or failed job. Same sweep rules as
    /// [`submit_all`](Self::submit_all).
    pub fn delete_all_completed_or_failed(&mut self, halt_on_error: bool) -> bool {
        let ids: Vec<String> = self
            .jobs
            .iter()
            .filter(|j| j.status.is_finished())
            .map(|j| j.id.clone())
            .collect();
        sweep(&ids, halt_on_error, |id| self.delete_job(id))
    }

    /// Tabular projection for reporting.
    pub fn list_jobs(&self, status_filter: Option<JobStatus>) -> JobList {
        JobList::compose(
            self.jobs
                .iter()
                .filter(|j| status_filter.map_or(true, |s| j.status == s)),
        )
    }

    /// Record a step's pass/fail.
    ///
    /// A failure under the halt policy fails the job immediately.
    pub fn mark_step_result(&mut self, job_id: &str, index: usize, success: bool) -> JobResult<()> {
        self.update(job_id, "record a step result for", &[JobStatus::Queued], |job| {
            let step = job
                .steps
                .get_mut(index)
                .ok_or_else(|| JobError::step_out_of_range(&job.id, index as isize))?;
            step.status = if success {
                StepStatus::Completed
            } else {
                StepStatus::Failed
            };
            if !success && job.halt_on_error {
                job.status = JobStatus::Failed;
            }
            Ok(())
        })
    }

    /// Queued → Completed. Every step must be completed.
    pub fn complete_job(&mut self, job_id: &str) -> JobResult<()> {
        self.update(job_id, "complete", &[JobStatus::Queued], |job| {
            if !job.all_steps_completed() {
                return Err(JobError::invalid_state(
                    &job.id,
                    job.status,
                    "complete (unfinished steps remain)",
                ));
            }
            job.status = JobStatus::Completed;
            Ok(())
        })
    }

    /// Queued → Failed.
    pub fn fail_job(&mut self, job_id: &str) -> JobResult<()> {
        self.update(job_id, "fail", &[JobStatus::Queued], |job| {
            job.status = JobStatus::Failed;
            Ok(())
        })
    }

    /// Failed → Queued. Failed steps go back to pending; completed steps
    /// keep their status so they are not run again.
    pub fn requeue_failed(&mut self, job_id: &str) -> JobResult<()> {
        self.update(job_id, "retry", &[JobStatus::Failed], |job| {
            for step in &mut job.steps {
                if step.status == StepStatus::Failed {
                    step.status = StepStatus::Pending;
                }
            }
            job.status = JobStatus::Queued;
            Ok(())
        })
    }

    fn position(&self, job_id: &str) -> JobResult<usize> {
        self.jobs
            .iter()
            .position(|j| j.id == job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Apply `mutate` to a copy of the job, persist it, then commit it.
    fn update<F>(
        &mut self,
        job_id: &str,
        operation: &str,
        allowed: &[JobStatus],
        mutate: F,
    ) -> JobResult<()>
    where
        F: FnOnce(&mut Job) -> JobResult<()>,
    {
        let index = self.position(job_id)?;
        let previous = self.jobs[index].status;
        if !allowed.contains(&previous) {
            return Err(JobError::invalid_state(job_id, previous, operation));
        }

        let mut job = self.jobs[index].clone();
        mutate(&mut job)?;
        job.touch();

        self.persist(&job, Some(previous))?;
        self.jobs[index] = job;
        Ok(())
    }

    fn job_file(&self, status: JobStatus, job_id: &str) -> Option<PathBuf> {
        self.jobs_path
            .as_ref()
            .map(|root| root.join(status.as_str()).join(format!("{}.json", job_id)))
    }

    /// Write the job file atomically and drop the old file after a move.
    fn persist(&self, job: &Job, previous: Option<JobStatus>) -> JobResult<()> {
        let Some(path) = self.job_file(job.status, &job.id) else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(job).map_err(|e| JobError::Serialize {
            job_id: job.id.clone(),
            source: e,
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| JobError::io(format!("creating {}", parent.display()), e))?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &json)
            .map_err(|e| JobError::io(format!("writing {}", temp_path.display()), e))?;
        fs::rename(&temp_path, &path)
            .map_err(|e| JobError::io(format!("renaming {}", path.display()), e))?;

        if let Some(previous) = previous.filter(|p| *p != job.status) {
            self.remove_file(previous, &job.id)?;
        }
        Ok(())
    }

    fn remove_file(&self, status: JobStatus, job_id: &str) -> JobResult<()> {
        let Some(path) = self.job_file(status, job_id) else {
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JobError::io(format!("removing {}", path.display()), e)),
        }
    }
}

/// Apply `action` to every id under the halt/continue policy.
fn sweep<F>(ids: &[String], halt_on_error: bool, mut action: F) -> bool
where
    F: FnMut(&str) -> JobResult<()>,
{
    if ids.is_empty() {
        return false;
    }

    let mut has_error = false;
    for id in ids {
        if let Err(e) = action(id) {
            tracing::warn!("{}", e);
            has_error = true;
            if halt_on_error {
                return false;
            }
        }
    }
    !has_error
}

fn load_job_file(path: &Path) -> Result<Job, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

fn validate_job_id(job_id: &str) -> JobResult<()> {
    let valid = !job_id.trim().is_empty()
        && job_id != "."
        && job_id != ".."
        && !job_id.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(JobError::InvalidId(job_id.to_string()))
    }
}

/// Resolve an existing step index; negative values count from the end.
fn resolve_step_index(len: usize, index: isize) -> Option<usize> {
    let resolved = if index < 0 { len as isize + index } else { index };
    (resolved >= 0 && (resolved as usize) < len).then_some(resolved as usize)
}

/// Resolve an insertion point in `0..=len`.
fn resolve_insert_index(len: usize, index: isize) -> Option<usize> {
    let resolved = if index < 0 { len as isize + index } else { index };
    (resolved >= 0 && (resolved as usize) <= len).then_some(resolved as usize)
}
