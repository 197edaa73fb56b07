//! Status - キューの状態スナップショット

use std::fmt;

use serde::Serialize;

use crate::queue::QueueSnapshot;

/// Approximate view of the pipeline. Depths can change right after it is
/// taken; it is never used for control flow inside the crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub primary_depth: usize,
    pub retry_depth: usize,

    /// Items a loop is holding right now (sending, or waiting out a backoff).
    pub in_flight: usize,
}

impl QueueStatus {
    pub(crate) fn from_snapshots(primary: QueueSnapshot, retry: QueueSnapshot) -> Self {
        Self {
            primary_depth: primary.depth,
            retry_depth: retry.depth,
            in_flight: primary.in_flight + retry.in_flight,
        }
    }

    /// Nothing queued and nothing being worked on.
    pub fn is_idle(&self) -> bool {
        self.primary_depth == 0 && self.retry_depth == 0 && self.in_flight == 0
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "primary={} retry={} in_flight={}",
            self.primary_depth, self.retry_depth, self.in_flight
        )
    }
}

/// What `shutdown` observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub primary_stopped: bool,
    pub retry_stopped: bool,

    /// Queued items dropped unprocessed.
    pub discarded: usize,
}

impl ShutdownReport {
    pub fn clean(&self) -> bool {
        self.primary_stopped && self.retry_stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_needs_everything_empty() {
        assert!(QueueStatus::default().is_idle());

        let busy = QueueStatus::from_snapshots(
            QueueSnapshot { depth: 0, in_flight: 0 },
            QueueSnapshot { depth: 0, in_flight: 1 },
        );
        assert!(!busy.is_idle());
        assert_eq!(busy.in_flight, 1);
    }

    #[test]
    fn status_serializes_field_names() {
        let status = QueueStatus {
            primary_depth: 2,
            retry_depth: 1,
            in_flight: 0,
        };
        let v = serde_json::to_value(status).unwrap();
        assert_eq!(v["primary_depth"], 2);
        assert_eq!(v["retry_depth"], 1);
        assert_eq!(status.to_string(), "primary=2 retry=1 in_flight=0");
    }
}
