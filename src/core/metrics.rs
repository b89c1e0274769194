//! Metrics sink implementations.
//!
//! One [`WindowRecord`] is appended per window rotation. A sink failure is
//! non-fatal: the pool logs it and keeps rotating without the record.

use std::collections::VecDeque;

use crate::core::error::PoolError;

/// Append-only record of one window rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    /// Timestamp of the rotation, milliseconds since the Unix epoch.
    pub at_ms: u128,
    /// Lifetime count of completed rotations, including this one.
    pub swap_count: u64,
    /// Tasks ever admitted across both queues at this instant.
    pub admitted_total: u64,
    /// Tasks ever rejected by admission control.
    pub rejected_total: u64,
    /// Tasks still waiting across both queues.
    pub waiting: u64,
    /// Tasks completed so far.
    pub completed_total: u64,
}

/// Metrics sink abstraction.
pub trait MetricsSink: Send {
    /// Append one rotation record.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::MetricsWrite`] if the record could not be
    /// stored. The pool treats this as non-fatal.
    fn record(&mut self, record: WindowRecord) -> Result<(), PoolError>;
}

/// In-memory sink with a bounded ring buffer, for tests and dev.
pub struct InMemoryMetricsSink {
    records: VecDeque<WindowRecord>,
    max_records: usize,
}

impl InMemoryMetricsSink {
    /// Create a sink keeping at most `max_records` of the newest records.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_records),
            max_records,
        }
    }

    /// Snapshot of the stored records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<WindowRecord> {
        self.records.iter().copied().collect()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(&mut self, record: WindowRecord) -> Result<(), PoolError> {
        if self.records.len() >= self.max_records {
            self.records.pop_front();
        }
        self.records.push_back(record);
        Ok(())
    }
}

/// Sink that emits one structured key/value log line per rotation.
///
/// This is the read-only metrics stream consumable by an external monitor;
/// the line format is opaque text, not a binary contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    fn record(&mut self, record: WindowRecord) -> Result<(), PoolError> {
        tracing::info!(
            at_ms = u64::try_from(record.at_ms).unwrap_or(u64::MAX),
            swap_count = record.swap_count,
            admitted_total = record.admitted_total,
            rejected_total = record.rejected_total,
            waiting = record.waiting,
            completed_total = record.completed_total,
            "window rotated"
        );
        Ok(())
    }
}
