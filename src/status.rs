//! 状态通知：向调用方（通常是 UI）报告请求进度。
//!
//! Status notifications for the caller (typically a UI showing progress).
//!
//! A [`StatusSink`] is purely observational. Services invoke it synchronously
//! on the calling thread and contain any panic it raises, so a misbehaving
//! sink can never change the outcome of a request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

/// Milestones reported during a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    /// Validation passed, the payload is about to be dispatched
    Sending,
    /// The request is on the wire
    Awaiting,
    /// A successful result was extracted
    Complete,
}

impl ProcessingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Awaiting => "awaiting",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress milestones.
pub trait StatusSink: Send + Sync {
    fn notify(&self, stage: ProcessingStage);
}

impl<F> StatusSink for F
where
    F: Fn(ProcessingStage) + Send + Sync,
{
    fn notify(&self, stage: ProcessingStage) {
        self(stage)
    }
}

/// Sink that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {
    fn notify(&self, _stage: ProcessingStage) {}
}

/// In-memory sink that records every stage, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingStatusSink {
    stages: Mutex<Vec<ProcessingStage>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> Vec<ProcessingStage> {
        match self.stages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.stages.lock() {
            guard.clear();
        }
    }
}

impl StatusSink for RecordingStatusSink {
    fn notify(&self, stage: ProcessingStage) {
        if let Ok(mut guard) = self.stages.lock() {
            guard.push(stage);
        }
    }
}

/// Invokes `sink` if present, swallowing any panic it raises.
pub(crate) fn notify_safely(sink: Option<&dyn StatusSink>, stage: ProcessingStage) {
    let Some(sink) = sink else {
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| sink.notify(stage))).is_err() {
        tracing::warn!(stage = stage.as_str(), "status sink panicked; notification dropped");
    }
}
