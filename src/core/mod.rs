//! Core scheduling types: tasks, queues, the worker pool, and metrics.

pub mod error;
pub mod metrics;
pub mod queue;
pub mod scheduler;
pub mod task;

pub use error::{AppResult, PoolError};
pub use metrics::{InMemoryMetricsSink, LogMetricsSink, MetricsSink, WindowRecord};
pub use queue::{BoundedQueue, QueueCounts};
pub use scheduler::{PoolStats, WindowPool};
pub use task::{Task, TaskId, Work};
