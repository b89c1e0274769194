//! Task records and the runnable payload abstraction.

use std::fmt;
use std::time::Duration;

/// Unique task identifier, assigned by the pool at successful admission.
///
/// Ids are monotonically increasing per pool and never caller-supplied;
/// rejected submissions consume no id.
pub type TaskId = u64;

/// A unit of work the pool can execute.
///
/// Any `FnOnce() + Send + 'static` is a `Work` via the blanket impl, so
/// closures capturing arbitrary owned state can be submitted directly. The
/// pool takes ownership at submission and invokes `run` at most once.
pub trait Work: Send + 'static {
    /// Consume the payload and perform the work.
    fn run(self: Box<Self>);
}

impl<F> Work for F
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (*self)();
    }
}

/// An admitted task: identifier, cost hint, and the owned payload.
///
/// The cost is a caller-provided estimate used only for admission
/// accounting; it is not a measured guarantee and does not bound execution.
pub struct Task {
    id: TaskId,
    estimated_cost: Duration,
    work: Box<dyn Work>,
}

impl Task {
    /// Create a task from an assigned id, cost hint, and payload.
    pub(crate) fn new(id: TaskId, estimated_cost: Duration, work: Box<dyn Work>) -> Self {
        Self {
            id,
            estimated_cost,
            work,
        }
    }

    /// The pool-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// The caller-supplied cost estimate.
    #[must_use]
    pub const fn estimated_cost(&self) -> Duration {
        self.estimated_cost
    }

    /// Consume the task and execute its payload.
    pub(crate) fn run(self) {
        self.work.run();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("estimated_cost", &self.estimated_cost)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_run_consumes_payload_once() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let task = Task::new(7, Duration::from_millis(20), Box::new(move || {
            flag.store(true, Ordering::SeqCst);
        }));

        assert_eq!(task.id(), 7);
        assert_eq!(task.estimated_cost(), Duration::from_millis(20));

        task.run();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_debug_omits_payload() {
        let task = Task::new(1, Duration::from_secs(1), Box::new(|| {}));
        let rendered = format!("{task:?}");
        assert!(rendered.contains("id: 1"));
        assert!(rendered.contains(".."));
    }
}
