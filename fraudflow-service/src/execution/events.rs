// Execution Events
// Progress reporting and event types for dataset runs

use crate::layer::{ExecutionMode, Tier};

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Run started
    RunStarted { total_nodes: usize },

    /// Run finished, successfully or not
    RunCompleted {
        success: bool,
        aborted: bool,
        duration: Duration,
    },

    /// Dataset execution started
    NodeStarted {
        name: String,
        tier: Tier,
        mode: ExecutionMode,
        index: usize,
    },

    /// Dataset output committed
    NodeCompleted {
        name: String,
        rows_in: usize,
        rows_written: usize,
        total_rows: usize,
        duration: Duration,
    },

    /// Dataset not executed in this run
    NodeSkipped { name: String, reason: String },

    /// Dataset failed; the run stops here
    NodeFailed { name: String, message: String },

    /// Log message (info, warning, error)
    Log {
        level: LogLevel,
        message: String,
        node: Option<String>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl ExecutionEvent {
    pub fn run_started(total_nodes: usize) -> Self {
        Self::RunStarted { total_nodes }
    }

    pub fn run_completed(success: bool, aborted: bool, duration: Duration) -> Self {
        Self::RunCompleted {
            success,
            aborted,
            duration,
        }
    }

    pub fn node_started(
        name: impl Into<String>,
        tier: Tier,
        mode: ExecutionMode,
        index: usize,
    ) -> Self {
        Self::NodeStarted {
            name: name.into(),
            tier,
            mode,
            index,
        }
    }

    pub fn node_completed(
        name: impl Into<String>,
        rows_in: usize,
        rows_written: usize,
        total_rows: usize,
        duration: Duration,
    ) -> Self {
        Self::NodeCompleted {
            name: name.into(),
            rows_in,
            rows_written,
            total_rows,
            duration,
        }
    }

    pub fn node_skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NodeSkipped {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn node_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an info log event
    pub fn info(message: impl Into<String>, node: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
            node,
        }
    }

    /// Create a warning log event
    pub fn warning(message: impl Into<String>, node: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            node,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
