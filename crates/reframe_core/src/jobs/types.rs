//! Job and step records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version written into every job file.
pub const JOB_FORMAT_VERSION: u32 = 1;

/// Lifecycle status of a job. Also names the folder its file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Being assembled; steps may be added, inserted, remixed or removed.
    Drafted,
    /// Submitted and waiting to run.
    Queued,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Drafted,
        JobStatus::Queued,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Drafted => "drafted",
            JobStatus::Queued => "queued",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the job has finished running, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => f.write_str("pending"),
            StepStatus::Completed => f.write_str("completed"),
            StepStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Opaque configuration snapshot captured when a step is added.
///
/// The job layer never interprets the keys; the dispatcher turns them into
/// a `RunContext`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepArgs(Map<String, Value>);

impl StepArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The snapshot as a JSON object value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for StepArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One unit of work within a job. Its ordinal is its index in `Job::steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub args: StepArgs,
    #[serde(default)]
    pub status: StepStatus,
}

impl Step {
    pub fn new(args: StepArgs) -> Self {
        Self {
            args,
            status: StepStatus::Pending,
        }
    }
}

/// A named, ordered collection of steps with a lifecycle status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub version: u32,
    pub id: String,
    pub status: JobStatus,
    /// Stop at the first failing step. When false every step is attempted
    /// and the job still ends failed if any step failed.
    #[serde(default = "default_true")]
    pub halt_on_error: bool,
    pub date_created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

impl Job {
    /// Create an empty drafted job.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            version: JOB_FORMAT_VERSION,
            id: id.into(),
            status: JobStatus::Drafted,
            halt_on_error: true,
            date_created: chrono::Local::now().to_rfc3339(),
            date_updated: None,
            steps: Vec::new(),
        }
    }

    pub fn step_total(&self) -> usize {
        self.steps.len()
    }

    pub fn all_steps_completed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    pub fn has_failed_step(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    /// Count of steps in the given status.
    pub fn count_steps(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub(crate) fn touch(&mut self) {
        self.date_updated = Some(chrono::Local::now().to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_with_lowercase_status() {
        let mut job = Job::new("j1");
        job.steps.push(Step::new(StepArgs::new().with("target_path", "/in.mp4")));

        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"status\":\"drafted\""));
        assert!(json.contains("\"target_path\":\"/in.mp4\""));
        assert!(json.contains("\"status\":\"pending\""));

        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn completion_requires_every_step() {
        let mut job = Job::new("j1");
        assert!(!job.all_steps_completed());

        job.steps.push(Step::new(StepArgs::new()));
        job.steps.push(Step::new(StepArgs::new()));
        job.steps[0].status = StepStatus::Completed;
        assert!(!job.all_steps_completed());

        job.steps[1].status = StepStatus::Completed;
        assert!(job.all_steps_completed());
        assert_eq!(job.count_steps(StepStatus::Completed), 2);
    }
}
