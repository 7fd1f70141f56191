use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub const OP_EXPLAIN_PLAN_OUTPUT: &str = "explain_plan_output";

/// One structured line handed to the telemetry sink.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub op: String,
    pub line: String,
}

impl LogEntry {
    pub fn new(op: &str, line: String) -> Self {
        Self {
            timestamp: Utc::now(),
            op: op.to_string(),
            line,
        }
    }
}

pub type EntrySender = mpsc::Sender<LogEntry>;
pub type EntryReceiver = mpsc::Receiver<LogEntry>;
