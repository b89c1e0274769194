//! Builders to construct window pools from configuration.

use std::collections::HashMap;

use crate::config::{SchedulerConfig, WindowPoolConfig};
use crate::core::error::PoolError;
use crate::core::metrics::MetricsSink;
use crate::core::scheduler::WindowPool;

/// Builder assembling a [`WindowPool`] from configuration and an optional
/// metrics sink.
pub struct WindowPoolBuilder {
    config: WindowPoolConfig,
    metrics: Option<Box<dyn MetricsSink>>,
}

impl WindowPoolBuilder {
    /// Start a builder from a pool configuration.
    #[must_use]
    pub const fn new(config: WindowPoolConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    /// Attach a metrics sink; one record is appended per window rotation.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Box<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and start the pool's threads.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid.
    pub fn build(self) -> Result<WindowPool, PoolError> {
        WindowPool::with_metrics_opt(self.config, self.metrics)
    }
}

impl std::fmt::Debug for WindowPoolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowPoolBuilder")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// Build one pool per entry of a scheduler configuration.
///
/// The metrics factory is invoked once per pool with the pool's name, so
/// each pool can get its own sink (or none).
///
/// # Errors
///
/// Returns [`PoolError::InvalidConfig`] if the configuration is invalid;
/// no pools are started in that case.
pub fn build_pools<F>(
    cfg: &SchedulerConfig,
    mut metrics_factory: F,
) -> Result<HashMap<String, WindowPool>, PoolError>
where
    F: FnMut(&str, &WindowPoolConfig) -> Option<Box<dyn MetricsSink>>,
{
    cfg.validate().map_err(PoolError::InvalidConfig)?;

    let mut pools = HashMap::new();
    for (name, pool_cfg) in &cfg.pools {
        let metrics = metrics_factory(name, pool_cfg);
        let pool = WindowPool::with_metrics_opt(pool_cfg.clone(), metrics)?;
        pools.insert(name.clone(), pool);
    }
    Ok(pools)
}
