use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Target => f.write_str("target"),
        }
    }
}

/// Structured fields attached to every log line a migration session emits.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub side: Side,
    pub project: String,
    pub instance: String,
    pub live: bool,
    /// Only set for sinks.
    pub push: Option<bool>,
    pub cluster_move_source_name: Option<String>,
}

impl LogContext {
    pub fn info(&self, message: &str) {
        info!(
            side = %self.side,
            project = %self.project,
            instance = %self.instance,
            live = self.live,
            push = ?self.push,
            cluster_move_source_name = ?self.cluster_move_source_name,
            "{}",
            message
        );
    }

    pub fn warn(&self, message: &str, err: &dyn fmt::Display) {
        warn!(
            side = %self.side,
            project = %self.project,
            instance = %self.instance,
            live = self.live,
            push = ?self.push,
            cluster_move_source_name = ?self.cluster_move_source_name,
            err = %err,
            "{}",
            message
        );
    }

    pub fn error(&self, message: &str, err: &dyn fmt::Display) {
        error!(
            side = %self.side,
            project = %self.project,
            instance = %self.instance,
            live = self.live,
            push = ?self.push,
            cluster_move_source_name = ?self.cluster_move_source_name,
            err = %err,
            "{}",
            message
        );
    }
}
