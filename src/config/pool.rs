//! Pool and scheduler configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-window budget, in milliseconds.
const DEFAULT_BUDGET_MAX_MS: u64 = 60_000;
/// Default window length (rotation interval), in milliseconds.
const DEFAULT_WINDOW_MS: u64 = 1_000;
/// Default worker thread stack size.
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Configuration for one window pool.
///
/// All parameters are fixed for the pool's lifetime; there is no hot reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowPoolConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Maximum aggregate estimated cost one window may hold, in milliseconds.
    pub budget_max_ms: u64,
    /// Window length (rotation interval), in milliseconds.
    pub window_ms: u64,
    /// Stack size for worker and timer threads, in bytes.
    #[serde(default = "default_stack_size")]
    pub thread_stack_size: usize,
}

fn default_stack_size() -> usize {
    DEFAULT_STACK_SIZE
}

impl Default for WindowPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            budget_max_ms: DEFAULT_BUDGET_MAX_MS,
            window_ms: DEFAULT_WINDOW_MS,
            thread_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl WindowPoolConfig {
    /// Create a configuration with defaults: one worker per logical CPU, a
    /// 60 second window budget, and a 1 second window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the per-window budget ceiling.
    #[must_use]
    pub const fn with_budget_max(mut self, budget: Duration) -> Self {
        self.budget_max_ms = budget.as_millis() as u64;
        self
    }

    /// Set the window length (rotation interval).
    #[must_use]
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window_ms = window.as_millis() as u64;
        self
    }

    /// Set the worker thread stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// The per-window budget ceiling.
    #[must_use]
    pub const fn budget_max(&self) -> Duration {
        Duration::from_millis(self.budget_max_ms)
    }

    /// The window length (rotation interval).
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a descriptive message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.budget_max_ms == 0 {
            return Err("budget_max_ms must be greater than 0".into());
        }
        if self.window_ms == 0 {
            return Err("window_ms must be greater than 0".into());
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root scheduler configuration: a set of named pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Map of pool name to configuration.
    pub pools: HashMap<String, WindowPoolConfig>,
}

impl SchedulerConfig {
    /// Validate all pools and ensure at least one pool exists.
    ///
    /// # Errors
    ///
    /// Returns a descriptive message naming the first invalid pool.
    pub fn validate(&self) -> Result<(), String> {
        if self.pools.is_empty() {
            return Err("at least one pool must be defined".into());
        }
        for (name, pool) in &self.pools {
            pool.validate()
                .map_err(|e| format!("pool `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = WindowPoolConfig::new();
        assert!(cfg.validate().is_ok());
        assert!(cfg.worker_count >= 1);
        assert_eq!(cfg.budget_max(), Duration::from_secs(60));
        assert_eq!(cfg.window(), Duration::from_secs(1));
    }

    #[test]
    fn test_setters() {
        let cfg = WindowPoolConfig::new()
            .with_worker_count(4)
            .with_budget_max(Duration::from_millis(500))
            .with_window(Duration::from_millis(50));
        assert_eq!(cfg.worker_count, 4);
        assert_eq!(cfg.budget_max_ms, 500);
        assert_eq!(cfg.window_ms, 50);
    }

    #[test]
    fn test_validation_rejects_zeroes() {
        assert!(WindowPoolConfig::new()
            .with_worker_count(0)
            .validate()
            .is_err());
        assert!(WindowPoolConfig::new()
            .with_budget_max(Duration::ZERO)
            .validate()
            .is_err());
        assert!(WindowPoolConfig::new()
            .with_window(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_scheduler_config_from_json() {
        let cfg = SchedulerConfig::from_json_str(
            r#"{
                "pools": {
                    "default": {
                        "worker_count": 2,
                        "budget_max_ms": 60000,
                        "window_ms": 1000
                    }
                }
            }"#,
        )
        .unwrap();
        let pool = &cfg.pools["default"];
        assert_eq!(pool.worker_count, 2);
        assert_eq!(pool.thread_stack_size, 2 * 1024 * 1024);
    }

    #[test]
    fn test_scheduler_config_rejects_empty_and_invalid() {
        assert!(SchedulerConfig::from_json_str(r#"{"pools": {}}"#).is_err());

        let err = SchedulerConfig::from_json_str(
            r#"{"pools": {"bad": {"worker_count": 0, "budget_max_ms": 1, "window_ms": 1}}}"#,
        )
        .unwrap_err();
        assert!(err.contains("pool `bad` invalid"));
    }
}
