//! Tracing setup for pool diagnostics.

use tracing_subscriber::EnvFilter;

/// Install a formatted `tracing` subscriber if none is set yet.
///
/// Honors `RUST_LOG` when present and otherwise defaults to
/// `window_pool=info`, which surfaces pool lifecycle and rotation events
/// without drowning callers in per-task debug lines. Embedders that install
/// their own subscriber first are left alone; repeated calls are no-ops.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("window_pool=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
        assert!(tracing::dispatcher::has_been_set());
    }
}
