//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides a concrete [`RuntimeScheduler`] for `sprig-core`.
//! Hosts construct a [`StdRuntime`], hand its [`RuntimeHandle`] to their
//! document and engine, and turn their loop whenever a tick is requested.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use sprig_core::{Runtime, RuntimeHandle, RuntimeScheduler};

/// Scheduler that records tick requests for a host loop to poll.
///
/// The runtime only asks for a tick when its microtask queue goes from empty
/// to non-empty, so `ticks_requested` counts coalesced batches of work.
#[derive(Debug, Default)]
pub struct StdScheduler {
    tick_requested: AtomicBool,
    ticks_requested: AtomicUsize,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a tick has been requested since the last call.
    pub fn take_tick_request(&self) -> bool {
        self.tick_requested.swap(false, Ordering::SeqCst)
    }

    /// Total ticks requested over the scheduler's lifetime.
    pub fn ticks_requested(&self) -> usize {
        self.ticks_requested.load(Ordering::SeqCst)
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_tick(&self) {
        self.ticks_requested.fetch_add(1, Ordering::SeqCst);
        self.tick_requested.store(true, Ordering::SeqCst);
    }
}

/// Runtime driven by a [`StdScheduler`], turned by the host loop through
/// [`StdRuntime::run_until_idle`].
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::new());
        let runtime = Runtime::new(scheduler.clone());
        Self { scheduler, runtime }
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    /// Returns whether a tick was requested since the last poll.
    pub fn take_tick_request(&self) -> bool {
        self.scheduler.take_tick_request()
    }

    pub fn ticks_requested(&self) -> usize {
        self.scheduler.ticks_requested()
    }

    /// Turns the loop until no tick is requested and the queue is empty.
    /// Returns the number of microtasks that ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        let mut turns = 0;
        while self.take_tick_request() || self.runtime.has_pending_microtasks() {
            ran += self.runtime.run_microtasks();
            turns += 1;
        }
        if ran > 0 {
            log::trace!("runtime idle after {ran} microtasks in {turns} turns");
        }
        ran
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("pending", &self.runtime.has_pending_microtasks())
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
