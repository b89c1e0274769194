//! Bounded FIFO task queue with cumulative time-budget admission.
//!
//! A [`BoundedQueue`] admits tasks only while the sum of their estimated
//! costs stays within a fixed budget. Admission is all-or-nothing: a task
//! that would overflow the budget is rejected and counted, never truncated.
//!
//! Each queue guards its state with its own mutex. The pool acquires its
//! control lock *before* any queue lock; nothing in this module ever takes
//! the pool lock, so the hierarchy cannot be inverted from here. `swap`
//! locks the two queues involved in address order, so no pair of `swap`
//! calls can deadlock regardless of argument order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::error::PoolError;
use crate::core::task::{Task, TaskId, Work};

/// Counters snapshot taken under the queue lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCounts {
    /// Lifetime count of tasks that passed admission.
    pub admitted: u64,
    /// Tasks currently queued.
    pub waiting: usize,
    /// Lifetime count of tasks rejected by the budget check.
    pub rejected: u64,
}

/// Mutable queue state, always consistent outside the lock.
struct QueueInner {
    entries: VecDeque<Task>,
    /// Sum of `estimated_cost` over `entries`. Invariant: equals the actual
    /// sum whenever the lock is not held, and never exceeds `budget_max`.
    budget_used: Duration,
    total_admitted: u64,
    total_seen: u64,
}

/// FIFO container of tasks with a cumulative time-budget admission policy.
pub struct BoundedQueue {
    budget_max: Duration,
    inner: Mutex<QueueInner>,
}

impl BoundedQueue {
    /// Create an empty queue with the given fixed budget ceiling.
    #[must_use]
    pub fn new(budget_max: Duration) -> Self {
        Self {
            budget_max,
            inner: Mutex::new(QueueInner {
                entries: VecDeque::new(),
                budget_used: Duration::ZERO,
                total_admitted: 0,
                total_seen: 0,
            }),
        }
    }

    /// The fixed budget ceiling.
    #[must_use]
    pub const fn budget_max(&self) -> Duration {
        self.budget_max
    }

    /// Try to admit a task under the budget.
    ///
    /// The check, the id assignment, and the insert happen in one critical
    /// section: no observer can see an admitted task without its cost
    /// accounted, or vice versa. Ids are drawn from `ids` only on success,
    /// so rejected offers consume no id.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AdmissionRejected`] if `budget_used + cost`
    /// would exceed the budget ceiling. The offer is still counted in
    /// `total_seen`.
    pub fn try_admit(
        &self,
        cost: Duration,
        work: Box<dyn Work>,
        ids: &AtomicU64,
    ) -> Result<TaskId, PoolError> {
        let mut inner = self.inner.lock();
        inner.total_seen += 1;

        let committed = inner.budget_used.saturating_add(cost);
        if committed > self.budget_max {
            debug!(
                cost_ms = cost.as_millis() as u64,
                used_ms = inner.budget_used.as_millis() as u64,
                budget_ms = self.budget_max.as_millis() as u64,
                "task rejected by window budget"
            );
            return Err(PoolError::AdmissionRejected {
                requested_ms: u64::try_from(cost.as_millis()).unwrap_or(u64::MAX),
                used_ms: u64::try_from(inner.budget_used.as_millis()).unwrap_or(u64::MAX),
                budget_ms: u64::try_from(self.budget_max.as_millis()).unwrap_or(u64::MAX),
            });
        }

        let id = ids.fetch_add(1, Ordering::Relaxed);
        inner.entries.push_back(Task::new(id, cost, work));
        inner.budget_used = committed;
        inner.total_admitted += 1;
        Ok(id)
    }

    /// Pop the head of the FIFO, releasing its cost from the budget.
    /// Non-blocking; returns `None` on an empty queue.
    pub fn take(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        let task = inner.entries.pop_front()?;
        inner.budget_used = inner.budget_used.saturating_sub(task.estimated_cost());
        Some(task)
    }

    /// Exchange entries and committed budget with `other` wholesale.
    ///
    /// Lifetime counters stay with each instance. Both internal locks are
    /// held for the exchange, acquired in address order so concurrent
    /// `a.swap(&b)` and `b.swap(&a)` calls cannot deadlock. Swapping a
    /// queue with itself is a no-op.
    pub fn swap(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }
        let (mut first, mut second) =
            if std::ptr::from_ref(self) < std::ptr::from_ref(other) {
                let first = self.inner.lock();
                let second = other.inner.lock();
                (first, second)
            } else {
                let second = other.inner.lock();
                let first = self.inner.lock();
                (first, second)
            };
        std::mem::swap(&mut first.entries, &mut second.entries);
        std::mem::swap(&mut first.budget_used, &mut second.budget_used);
    }

    /// Discard all queued tasks and zero the committed budget.
    ///
    /// Returns the number of tasks discarded unexecuted. Used for immediate
    /// shutdown and for resetting the intake shell right after a swap.
    pub fn drain_and_reset(&self) -> usize {
        let mut inner = self.inner.lock();
        let discarded = inner.entries.len();
        inner.entries.clear();
        inner.budget_used = Duration::ZERO;
        discarded
    }

    /// Consistent snapshot of the lifetime and current counters.
    #[must_use]
    pub fn snapshot(&self) -> QueueCounts {
        let inner = self.inner.lock();
        QueueCounts {
            admitted: inner.total_admitted,
            waiting: inner.entries.len(),
            rejected: inner.total_seen - inner.total_admitted,
        }
    }

    /// Number of tasks currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the queue is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cost currently committed to this queue.
    #[must_use]
    pub fn budget_used(&self) -> Duration {
        self.inner.lock().budget_used
    }
}

impl std::fmt::Debug for BoundedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedQueue")
            .field("budget_max", &self.budget_max)
            .field("budget_used", &inner.budget_used)
            .field("waiting", &inner.entries.len())
            .field("total_admitted", &inner.total_admitted)
            .field("total_seen", &inner.total_seen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Box<dyn Work> {
        Box::new(|| {})
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_admission_within_budget() {
        let ids = AtomicU64::new(0);
        let q = BoundedQueue::new(secs(60));

        let a = q.try_admit(secs(20), noop(), &ids).unwrap();
        let b = q.try_admit(secs(20), noop(), &ids).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(q.budget_used(), secs(40));
        assert_eq!(
            q.snapshot(),
            QueueCounts {
                admitted: 2,
                waiting: 2,
                rejected: 0
            }
        );
    }

    #[test]
    fn test_rejection_never_truncates() {
        let ids = AtomicU64::new(0);
        let q = BoundedQueue::new(secs(60));
        q.try_admit(secs(20), noop(), &ids).unwrap();
        q.try_admit(secs(20), noop(), &ids).unwrap();

        // 40 + 25 > 60: rejected whole, budget untouched, no id consumed.
        let err = q.try_admit(secs(25), noop(), &ids).unwrap_err();
        assert!(matches!(
            err,
            PoolError::AdmissionRejected {
                requested_ms: 25_000,
                used_ms: 40_000,
                budget_ms: 60_000,
            }
        ));
        assert_eq!(q.budget_used(), secs(40));
        assert_eq!(ids.load(Ordering::Relaxed), 2);
        assert_eq!(
            q.snapshot(),
            QueueCounts {
                admitted: 2,
                waiting: 2,
                rejected: 1
            }
        );
    }

    #[test]
    fn test_single_oversized_task_rejected() {
        let ids = AtomicU64::new(0);
        let q = BoundedQueue::new(secs(60));
        assert!(q.try_admit(secs(61), noop(), &ids).is_err());
        assert!(q.is_empty());
        assert_eq!(q.budget_used(), Duration::ZERO);
    }

    #[test]
    fn test_exact_budget_fill_admitted() {
        let ids = AtomicU64::new(0);
        let q = BoundedQueue::new(secs(60));
        assert!(q.try_admit(secs(60), noop(), &ids).is_ok());
        assert_eq!(q.budget_used(), secs(60));
        assert!(q.try_admit(Duration::from_millis(1), noop(), &ids).is_err());
    }

    #[test]
    fn test_take_is_fifo_and_releases_budget() {
        let ids = AtomicU64::new(0);
        let q = BoundedQueue::new(secs(60));
        q.try_admit(secs(10), noop(), &ids).unwrap();
        q.try_admit(secs(20), noop(), &ids).unwrap();
        q.try_admit(secs(30), noop(), &ids).unwrap();

        assert_eq!(q.take().unwrap().id(), 0);
        assert_eq!(q.budget_used(), secs(50));
        assert_eq!(q.take().unwrap().id(), 1);
        assert_eq!(q.take().unwrap().id(), 2);
        assert!(q.take().is_none());
        assert_eq!(q.budget_used(), Duration::ZERO);
    }

    #[test]
    fn test_swap_conserves_contents_and_counters() {
        let ids = AtomicU64::new(0);
        let active = BoundedQueue::new(secs(60));
        let intake = BoundedQueue::new(secs(60));
        intake.try_admit(secs(20), noop(), &ids).unwrap();
        intake.try_admit(secs(20), noop(), &ids).unwrap();

        active.swap(&intake);
        let discarded = intake.drain_and_reset();

        // Everything admitted moved to active; the intake shell was empty.
        assert_eq!(discarded, 0);
        assert_eq!(active.len(), 2);
        assert_eq!(active.budget_used(), secs(40));
        assert!(intake.is_empty());
        assert_eq!(intake.budget_used(), Duration::ZERO);

        // Lifetime counters stayed with their instances.
        assert_eq!(intake.snapshot().admitted, 2);
        assert_eq!(active.snapshot().admitted, 0);
    }

    #[test]
    fn test_drain_discards_unexecuted() {
        let ids = AtomicU64::new(0);
        let q = BoundedQueue::new(secs(60));
        q.try_admit(secs(10), noop(), &ids).unwrap();
        q.try_admit(secs(10), noop(), &ids).unwrap();
        q.try_admit(secs(10), noop(), &ids).unwrap();

        assert_eq!(q.drain_and_reset(), 3);
        assert!(q.is_empty());
        assert_eq!(q.budget_used(), Duration::ZERO);
        // Lifetime admission history is not erased by a drain.
        assert_eq!(q.snapshot().admitted, 3);
    }

    #[test]
    fn test_opposing_swaps_do_not_deadlock() {
        use std::sync::Arc;
        use std::thread;

        let ids = AtomicU64::new(0);
        let a = Arc::new(BoundedQueue::new(secs(60)));
        let b = Arc::new(BoundedQueue::new(secs(60)));
        a.try_admit(secs(10), noop(), &ids).unwrap();
        b.try_admit(secs(20), noop(), &ids).unwrap();

        // Opposite argument orders from two threads; address-ordered locking
        // means neither can hold one queue while waiting on the other.
        let mut handles = Vec::new();
        for _ in 0..4 {
            let (qa, qb) = (Arc::clone(&a), Arc::clone(&b));
            handles.push(thread::spawn(move || {
                for _ in 0..1_000 {
                    qa.swap(&qb);
                }
            }));
            let (qa, qb) = (Arc::clone(&a), Arc::clone(&b));
            handles.push(thread::spawn(move || {
                for _ in 0..1_000 {
                    qb.swap(&qa);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // Contents were only ever exchanged, never lost or duplicated.
        let mut costs = [a.budget_used(), b.budget_used()];
        costs.sort();
        assert_eq!(costs, [secs(10), secs(20)]);
        assert_eq!(a.len() + b.len(), 2);
    }

    #[test]
    fn test_self_swap_is_a_no_op() {
        let ids = AtomicU64::new(0);
        let q = BoundedQueue::new(secs(60));
        q.try_admit(secs(10), noop(), &ids).unwrap();

        q.swap(&q);
        assert_eq!(q.len(), 1);
        assert_eq!(q.budget_used(), secs(10));
    }

    #[test]
    fn test_budget_renews_after_rotation() {
        let ids = AtomicU64::new(0);
        let active = BoundedQueue::new(secs(60));
        let intake = BoundedQueue::new(secs(60));
        intake.try_admit(secs(60), noop(), &ids).unwrap();
        assert!(intake.try_admit(secs(1), noop(), &ids).is_err());

        active.swap(&intake);
        intake.drain_and_reset();

        // Fresh window: the same cost fits again.
        assert!(intake.try_admit(secs(1), noop(), &ids).is_ok());
    }
}
