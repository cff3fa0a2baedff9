//! Tabular job listing.

use serde::Serialize;

use super::types::Job;

/// Column headers of a job listing.
pub const JOB_LIST_HEADERS: [&str; 5] = ["job id", "steps", "date created", "date updated", "job status"];

/// Job listing as header and row cells, ready for any table renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobList {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl JobList {
    pub fn compose<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let rows = jobs
            .into_iter()
            .map(|job| {
                vec![
                    job.id.clone(),
                    job.step_total().to_string(),
                    describe_date(&job.date_created),
                    job.date_updated.as_deref().map(describe_date).unwrap_or_default(),
                    job.status.to_string(),
                ]
            })
            .collect();

        Self {
            headers: JOB_LIST_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Render an RFC 3339 timestamp as local `YYYY-MM-DD HH:MM:SS`.
/// Unparseable values are shown as stored.
fn describe_date(value: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| value.to_string())
}
