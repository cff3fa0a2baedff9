//! Process-wide run state used for cooperative cancellation.
//!
//! A pipeline run moves the state to `Processing` when it starts touching
//! the workspace and back to `Idle` on every exit. Any thread holding the
//! shared `Arc<ProcessState>` may request a stop; the pipeline observes it
//! at its checkpoints and unwinds.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessStatus {
    Idle = 0,
    Processing = 1,
    Stopping = 2,
}

impl ProcessStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ProcessStatus::Processing,
            2 => ProcessStatus::Stopping,
            _ => ProcessStatus::Idle,
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Idle => write!(f, "idle"),
            ProcessStatus::Processing => write!(f, "processing"),
            ProcessStatus::Stopping => write!(f, "stopping"),
        }
    }
}

/// Tri-state run flag. Idle at creation.
#[derive(Debug)]
pub struct ProcessState {
    status: AtomicU8,
}

impl ProcessState {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(ProcessStatus::Idle as u8),
        }
    }

    pub fn status(&self) -> ProcessStatus {
        ProcessStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Enter `Processing`.
    pub fn start(&self) {
        self.status
            .store(ProcessStatus::Processing as u8, Ordering::SeqCst);
    }

    /// Return to `Idle`. Harmless when already idle.
    pub fn end(&self) {
        self.status.store(ProcessStatus::Idle as u8, Ordering::SeqCst);
    }

    /// Ask a running pipeline to stop.
    ///
    /// Only a `Processing` state moves to `Stopping`; otherwise nothing
    /// happens. Returns true if this call made the transition.
    pub fn request_stop(&self) -> bool {
        let changed = self
            .status
            .compare_exchange(
                ProcessStatus::Processing as u8,
                ProcessStatus::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if changed {
            tracing::info!("Stop requested");
        }
        changed
    }

    pub fn is_processing(&self) -> bool {
        self.status() == ProcessStatus::Processing
    }

    pub fn is_stopping(&self) -> bool {
        self.status() == ProcessStatus::Stopping
    }

    /// Whether a run is in flight (processing or winding down).
    pub fn is_pending(&self) -> bool {
        self.status() != ProcessStatus::Idle
    }

    /// Cancellation checkpoint.
    ///
    /// A pending stop request is acknowledged by ending the run. Returns
    /// true when the caller must unwind: after acknowledging a stop, or when
    /// the run was already ended.
    pub fn observe_stop(&self) -> bool {
        match self.status() {
            ProcessStatus::Stopping => {
                self.end();
                true
            }
            ProcessStatus::Idle => true,
            ProcessStatus::Processing => false,
        }
    }

    /// Start a run that ends when the returned guard drops.
    pub fn begin(&self) -> ProcessingSession<'_> {
        self.start();
        ProcessingSession { state: self }
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`ProcessState::begin`]. Ends the run on drop.
#[derive(Debug)]
pub struct ProcessingSession<'a> {
    state: &'a ProcessState,
}

impl Drop for ProcessingSession<'_> {
    fn drop(&mut self) {
        self.state.end();
    }
}
