//! Platform abstraction for the sprig runtime.
//!
//! The engine never blocks or spins on its own. Whenever work is queued on an
//! idle runtime the host is asked, through [`RuntimeScheduler`], to turn its
//! loop and drain the queue.

/// Schedules work for the sprig runtime.
///
/// Implementations must be safe to share across threads even though the
/// runtime itself is driven from a single thread.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host drain queued microtasks on its next turn.
    fn schedule_tick(&self);
}
