//! The window pool: fixed worker threads draining timer-rotated queues.
//!
//! A [`WindowPool`] owns two [`BoundedQueue`]s. Submissions are admitted
//! into `intake` against the window budget; every `window` interval a timer
//! thread swaps `intake` into `active` under the pool lock and wakes the
//! workers. Workers only ever dequeue from `active`, so the rotation is the
//! sole path from "admitted, waiting" to "eligible for execution".
//!
//! # Lock Hierarchy
//!
//! The pool control lock (stop/pause flags, rotation serialization) is
//! always acquired before any queue's internal lock and never after one.
//! Every code path in this module observes that order; the queues never
//! reach back into pool state.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::WindowPoolConfig;
use crate::core::error::PoolError;
use crate::core::metrics::{MetricsSink, WindowRecord};
use crate::core::queue::BoundedQueue;
use crate::core::task::{TaskId, Work};
use crate::util::clock::now_ms;

/// Pool lifecycle flags, protected by the pool control lock.
struct ControlState {
    /// Set once by `shutdown`, never cleared. Workers and the timer exit on
    /// their next wake after observing it.
    stopped: bool,
    /// While set, workers do not dequeue and the timer skips rotations.
    /// In-flight work is not interrupted.
    paused: bool,
}

/// Lifetime counters, all lock-free.
#[derive(Default)]
struct PoolCounters {
    completed: AtomicU64,
    faulted: AtomicU64,
    rejected: AtomicU64,
    discarded: AtomicU64,
    swap_count: AtomicU64,
}

/// Snapshot of pool state and lifetime counters.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// The fixed per-window budget.
    pub budget_max: Duration,
    /// The rotation interval.
    pub window: Duration,
    /// Tasks admitted and waiting for the next rotation.
    pub intake_waiting: usize,
    /// Tasks runnable in the current window.
    pub active_waiting: usize,
    /// Lifetime count of admitted tasks.
    pub admitted_tasks: u64,
    /// Lifetime count of tasks rejected by admission control.
    pub rejected_tasks: u64,
    /// Lifetime count of tasks whose work completed normally.
    pub completed_tasks: u64,
    /// Lifetime count of tasks whose work panicked.
    pub faulted_tasks: u64,
    /// Lifetime count of admitted tasks discarded unexecuted.
    pub discarded_tasks: u64,
    /// Lifetime count of completed window rotations.
    pub swap_count: u64,
    /// Whether the pool is currently paused.
    pub paused: bool,
    /// Whether the pool has been shut down.
    pub stopped: bool,
}

/// State shared between the pool handle, workers, and the timer.
struct PoolShared {
    config: WindowPoolConfig,
    /// Admission target. All submissions land here.
    intake: BoundedQueue,
    /// Drain source. Workers only ever take from here.
    active: BoundedQueue,
    control: Mutex<ControlState>,
    /// Wakes workers: on rotation, resume, and shutdown.
    work_ready: Condvar,
    /// Paces the timer; notified only on shutdown so the window sleep can
    /// be interrupted.
    timer_gate: Condvar,
    next_task_id: AtomicU64,
    counters: PoolCounters,
    metrics: Option<Mutex<Box<dyn MetricsSink>>>,
}

/// Time-windowed, capacity-bounded scheduler with a fixed worker pool.
///
/// Multiple pools are mutually isolated: every piece of shared state is
/// owned by one instance, never process-wide.
pub struct WindowPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl WindowPool {
    /// Create a pool, spawning `worker_count` worker threads and the timer.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: WindowPoolConfig) -> Result<Self, PoolError> {
        Self::with_metrics_opt(config, None)
    }

    /// Create a pool that appends one record per rotation to `metrics`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid.
    pub fn with_metrics(
        config: WindowPoolConfig,
        metrics: Box<dyn MetricsSink>,
    ) -> Result<Self, PoolError> {
        Self::with_metrics_opt(config, Some(metrics))
    }

    pub(crate) fn with_metrics_opt(
        config: WindowPoolConfig,
        metrics: Option<Box<dyn MetricsSink>>,
    ) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let budget_max = config.budget_max();
        let shared = Arc::new(PoolShared {
            intake: BoundedQueue::new(budget_max),
            active: BoundedQueue::new(budget_max),
            control: Mutex::new(ControlState {
                stopped: false,
                paused: false,
            }),
            work_ready: Condvar::new(),
            timer_gate: Condvar::new(),
            next_task_id: AtomicU64::new(0),
            counters: PoolCounters::default(),
            metrics: metrics.map(Mutex::new),
            config,
        });

        let workers = (0..shared.config.worker_count)
            .map(|worker_id| spawn_worker(worker_id, Arc::clone(&shared)))
            .collect();
        let timer = spawn_timer(Arc::clone(&shared));

        info!(
            worker_count = shared.config.worker_count,
            budget_max_ms = shared.config.budget_max_ms,
            window_ms = shared.config.window_ms,
            "window pool started"
        );

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Submit a unit of work with its estimated cost.
    ///
    /// Admission is checked against the current window's remaining budget.
    /// Safe to call concurrently from arbitrarily many producer threads.
    ///
    /// # Errors
    ///
    /// - [`PoolError::AdmissionRejected`] if the cost would exceed the
    ///   window budget. Expected and non-fatal; counted in `rejected_tasks`.
    /// - [`PoolError::PoolShutdown`] after `shutdown` has been called.
    pub fn submit<W>(&self, estimated_cost: Duration, work: W) -> Result<TaskId, PoolError>
    where
        W: Work,
    {
        // Pool lock outer, intake lock inner: serializes admission against
        // rotation without holding the queue lock across the stop check.
        let control = self.shared.control.lock();
        if control.stopped {
            return Err(PoolError::PoolShutdown);
        }
        let result =
            self.shared
                .intake
                .try_admit(estimated_cost, Box::new(work), &self.shared.next_task_id);
        drop(control);

        match &result {
            Ok(id) => {
                debug!(task_id = *id, cost_ms = estimated_cost.as_millis() as u64, "task admitted");
            }
            Err(err) if err.is_rejection() => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(cost_ms = estimated_cost.as_millis() as u64, "task rejected");
            }
            Err(_) => {}
        }
        result
    }

    /// Stop workers from dequeueing until [`resume`](Self::resume).
    ///
    /// In-flight work is not interrupted, admission continues, and the timer
    /// skips rotations while paused.
    pub fn pause(&self) {
        let mut control = self.shared.control.lock();
        control.paused = true;
        info!("pool paused");
    }

    /// Resume dequeueing and wake waiting workers.
    pub fn resume(&self) {
        let mut control = self.shared.control.lock();
        control.paused = false;
        drop(control);
        self.shared.work_ready.notify_all();
        info!("pool resumed");
    }

    /// Shut the pool down and join every worker and the timer. Idempotent.
    ///
    /// Graceful (`immediate == false`): a worker racing the stop flag may
    /// still pick up queued work, and a task already dequeued runs to
    /// completion, but nothing new is taken once the flag is observed.
    /// Immediate: both queues are drained first, discarding queued-but-
    /// unstarted tasks; an in-flight task still runs to completion.
    pub fn shutdown(&self, immediate: bool) {
        {
            let mut control = self.shared.control.lock();
            let first = !control.stopped;
            control.stopped = true;
            if immediate && first {
                let discarded =
                    self.shared.active.drain_and_reset() + self.shared.intake.drain_and_reset();
                self.shared
                    .counters
                    .discarded
                    .fetch_add(discarded as u64, Ordering::Relaxed);
                info!(discarded, "immediate shutdown discarded queued tasks");
            }
        }
        self.shared.work_ready.notify_all();
        self.shared.timer_gate.notify_all();

        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        if let Some(handle) = self.timer.lock().take() {
            if handle.join().is_err() {
                warn!("timer thread panicked");
            }
        }
        info!("pool shut down");
    }

    /// Snapshot current pool state and lifetime counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (paused, stopped) = {
            let control = self.shared.control.lock();
            (control.paused, control.stopped)
        };
        let intake = self.shared.intake.snapshot();
        let active = self.shared.active.snapshot();
        let counters = &self.shared.counters;
        PoolStats {
            worker_count: self.shared.config.worker_count,
            budget_max: self.shared.config.budget_max(),
            window: self.shared.config.window(),
            intake_waiting: intake.waiting,
            active_waiting: active.waiting,
            admitted_tasks: intake.admitted + active.admitted,
            rejected_tasks: counters.rejected.load(Ordering::Relaxed),
            completed_tasks: counters.completed.load(Ordering::Relaxed),
            faulted_tasks: counters.faulted.load(Ordering::Relaxed),
            discarded_tasks: counters.discarded.load(Ordering::Relaxed),
            swap_count: counters.swap_count.load(Ordering::Relaxed),
            paused,
            stopped,
        }
    }
}

impl Drop for WindowPool {
    /// Implicit graceful shutdown: the pool cannot be destroyed with live
    /// threads still attached.
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

impl std::fmt::Debug for WindowPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Spawn one worker thread.
fn spawn_worker(worker_id: usize, shared: Arc<PoolShared>) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("wp-worker-{worker_id}"))
        .stack_size(shared.config.thread_stack_size)
        .spawn(move || {
            debug!(worker_id, "worker thread started");
            worker_loop(worker_id, &shared);
            debug!(worker_id, "worker thread exiting");
        })
        .expect("failed to spawn worker thread")
}

/// Worker loop: wait for runnable work, execute it outside all locks,
/// isolate panics to the task boundary.
fn worker_loop(worker_id: usize, shared: &PoolShared) {
    loop {
        let task = {
            let mut control = shared.control.lock();
            loop {
                if control.stopped {
                    return;
                }
                if !control.paused {
                    if let Some(task) = shared.active.take() {
                        break task;
                    }
                }
                shared.work_ready.wait(&mut control);
            }
        };

        let task_id = task.id();
        debug!(worker_id, task_id, "worker executing task");
        match catch_unwind(AssertUnwindSafe(move || task.run())) {
            Ok(()) => {
                shared.counters.completed.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id, task_id, "worker completed task");
            }
            Err(_) => {
                shared.counters.faulted.fetch_add(1, Ordering::Relaxed);
                error!(worker_id, task_id, "task panicked; worker continues");
            }
        }
    }
}

/// Spawn the timer thread driving window rotations.
fn spawn_timer(shared: Arc<PoolShared>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("wp-timer".into())
        .stack_size(shared.config.thread_stack_size)
        .spawn(move || {
            debug!("timer thread started");
            timer_loop(&shared);
            debug!("timer thread exiting");
        })
        .expect("failed to spawn timer thread")
}

/// Timer loop: sleep one window, then rotate intake into active under the
/// pool lock and wake the workers.
fn timer_loop(shared: &PoolShared) {
    let window = shared.config.window();
    loop {
        let mut control = shared.control.lock();
        if control.stopped {
            return;
        }
        let timed_out = shared
            .timer_gate
            .wait_for(&mut control, window)
            .timed_out();
        if control.stopped {
            return;
        }
        if !timed_out {
            // Woken without a stop flag: treat as spurious and re-sleep.
            continue;
        }
        if control.paused {
            debug!("rotation skipped while paused");
            continue;
        }
        if !shared.active.is_empty() {
            // The previous window is still draining. Rotating now would put
            // its remainder into the intake shell and the post-swap reset
            // would discard admitted work, so the rotation is deferred.
            debug!("rotation deferred: previous window not yet drained");
            continue;
        }

        // Rotation proper, still under the pool lock. Fixed queue lock
        // order: active first, then intake. The swap leaves the old active
        // contents (empty, checked above) in intake; the reset returns the
        // shell to a zero budget.
        shared.active.swap(&shared.intake);
        shared.intake.drain_and_reset();
        let swap_count = shared.counters.swap_count.fetch_add(1, Ordering::Relaxed) + 1;

        let intake = shared.intake.snapshot();
        let active = shared.active.snapshot();
        drop(control);

        let record = WindowRecord {
            at_ms: now_ms(),
            swap_count,
            admitted_total: intake.admitted + active.admitted,
            rejected_total: shared.counters.rejected.load(Ordering::Relaxed),
            waiting: (intake.waiting + active.waiting) as u64,
            completed_total: shared.counters.completed.load(Ordering::Relaxed),
        };
        if let Some(metrics) = &shared.metrics {
            if let Err(err) = metrics.lock().record(record) {
                // Non-fatal: the pool degrades to running without metrics.
                warn!(error = %err, "metrics write failed; rotation continues");
            }
        }

        debug!(
            swap_count,
            runnable = active.waiting,
            "window rotated"
        );
        shared.work_ready.notify_all();
    }
}
