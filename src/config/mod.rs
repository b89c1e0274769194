//! Configuration models for pools and validation.

pub mod pool;

pub use pool::{SchedulerConfig, WindowPoolConfig};
