//! # Window Pool
//!
//! A time-windowed, capacity-bounded task scheduler with a fixed worker pool.
//!
//! Producers submit units of work tagged with an estimated execution cost.
//! Each submission is admitted against a rolling per-window time budget:
//! work that would push the window's committed cost past the budget is
//! rejected outright, never truncated. Admitted work collects in an intake
//! queue until a background timer rotates it into the active queue, where a
//! fixed set of worker threads drains it in FIFO order.
//!
//! ## Core Behavior
//!
//! - **Admission control**: the intake queue holds at most `budget_max`
//!   worth of estimated cost; oversized submissions get a synchronous
//!   rejection the caller can observe and count.
//! - **Window rotation**: every `window` interval the timer swaps the intake
//!   and active queues under the pool lock, so admission bursts are smoothed
//!   into discrete batches and the budget renews each window.
//! - **Fixed worker pool**: workers block on a condition variable until the
//!   active queue has work and the pool is not paused, pop one task, and run
//!   it outside all locks. A panicking task is contained at the task
//!   boundary and never takes a worker down.
//! - **Lifecycle control**: `pause`/`resume` gate dequeueing without
//!   interrupting in-flight work; `shutdown` is graceful (queued work may
//!   still drain) or immediate (queued work is discarded). Dropping a pool
//!   performs an implicit graceful shutdown and joins every thread.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use window_pool::builders::WindowPoolBuilder;
//! use window_pool::config::WindowPoolConfig;
//!
//! let pool = WindowPoolBuilder::new(
//!     WindowPoolConfig::new()
//!         .with_worker_count(4)
//!         .with_budget_max(Duration::from_secs(60))
//!         .with_window(Duration::from_secs(1)),
//! )
//! .build()?;
//!
//! let id = pool.submit(Duration::from_secs(20), || heavy_work())?;
//! pool.shutdown(false);
//! ```
//!
//! ## Lock Hierarchy
//!
//! Two lock levels exist: the pool control lock (stop/pause flags, rotation)
//! and each queue's internal lock. The pool lock is always acquired before a
//! queue lock and never after one; `BoundedQueue::swap` locks its two queues
//! in address order, so concurrent swaps over the same pair cannot deadlock.
//! See the module docs in [`core::scheduler`] and [`core::queue`].

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

/// Core scheduling types: tasks, queues, the worker pool, and metrics.
pub mod core;
/// Configuration models for pools and validation.
pub mod config;
/// Builders to construct pools from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
