use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::platform::RuntimeScheduler;

pub type Microtask = Box<dyn FnOnce() + 'static>;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    microtasks: RefCell<VecDeque<Microtask>>,
    draining: Cell<bool>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            microtasks: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
        }
    }

    fn enqueue(&self, task: Microtask) {
        let was_idle = {
            let mut queue = self.microtasks.borrow_mut();
            let idle = queue.is_empty();
            queue.push_back(task);
            idle
        };
        // A running drain picks the task up before it returns.
        if was_idle && !self.draining.get() {
            self.scheduler.schedule_tick();
        }
    }

    fn drain(&self) -> usize {
        if self.draining.replace(true) {
            return 0;
        }

        struct Guard<'a>(&'a Cell<bool>);

        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }

        let _guard = Guard(&self.draining);
        let mut ran = 0;
        loop {
            let next = self.microtasks.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    fn has_pending(&self) -> bool {
        !self.microtasks.borrow().is_empty()
    }
}

/// Single-threaded cooperative loop owning the microtask queue.
///
/// Microtasks run in the order they were queued. Tasks queued while the queue
/// is being drained run in the same drain, mirroring a browser microtask
/// checkpoint.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    /// Runs queued microtasks until the queue is empty and returns how many ran.
    ///
    /// Calling this from inside a microtask is a no-op returning `0`.
    pub fn run_microtasks(&self) -> usize {
        self.inner.drain()
    }

    pub fn has_pending_microtasks(&self) -> bool {
        self.inner.has_pending()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_tick(&self) {}
}

/// Weak handle to a [`Runtime`], held by components that queue work.
#[derive(Clone)]
pub struct RuntimeHandle(pub(crate) Weak<RuntimeInner>);

impl RuntimeHandle {
    /// Queues `task` to run on the next microtask checkpoint.
    ///
    /// When the runtime is gone the task runs immediately.
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        match self.0.upgrade() {
            Some(inner) => inner.enqueue(Box::new(task)),
            None => task(),
        }
    }

    pub fn has_pending_microtasks(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_pending())
            .unwrap_or(false)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
