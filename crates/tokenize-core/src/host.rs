//! Host scheduling primitives.
//!
//! The engine never owns a thread or a timer. It asks its [`Host`] for two
//! things: an *idle callback* carrying a deadline (tens of milliseconds of
//! budget), and a *zero-delay task* used to yield inside an idle window so
//! the host can interleave input handling and paints between ~1 ms work
//! bursts.
//!
//! Platforms without a browser-style idle API synthesise one;
//! [`ManualHost`] is the bundled synthesis: a serial queue the owner pumps
//! explicitly, with a manual clock. It doubles as the deterministic test
//! host.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Remaining-time handle granted to an idle callback.
pub trait IdleDeadline {
    /// Milliseconds of budget left in this idle window. Never negative.
    fn time_remaining(&self) -> f64;
}

/// A callback run when the host is idle.
pub type IdleCallback = Box<dyn FnOnce(&dyn IdleDeadline)>;

/// A zero-delay continuation posted to the host's task queue.
pub type Task = Box<dyn FnOnce()>;

/// Scheduling surface the engine requires from its embedder.
///
/// Implementations must deliver callbacks **serially on one thread**: the
/// engine's single `scheduled` bit is its only re-entrancy guard, and it
/// relies on no two idle callbacks overlapping. Tasks scheduled with
/// [`Host::schedule_task`] must run before the next idle callback.
pub trait Host {
    /// Run `callback` when the host is next idle, passing the remaining
    /// idle budget.
    fn request_idle_callback(&self, callback: IdleCallback);

    /// Run `task` after the current unit of work completes, ahead of any
    /// pending idle callback.
    fn schedule_task(&self, task: Task);

    /// Monotonic wall clock in milliseconds.
    fn now(&self) -> f64;
}

/// Deterministic serial [`Host`] driven by explicit pumping.
///
/// Work only happens inside [`ManualHost::run_one`] /
/// [`ManualHost::run_until_idle`]; the clock only moves through
/// [`ManualHost::advance`] (or a callee calling it). Both queues drain in
/// FIFO order, tasks strictly before idle callbacks, which satisfies the
/// serial-delivery requirement of [`Host`].
pub struct ManualHost {
    clock_ms: Cell<f64>,
    idle_budget_ms: Cell<f64>,
    tasks: RefCell<VecDeque<Task>>,
    idle_callbacks: RefCell<VecDeque<IdleCallback>>,
}

impl ManualHost {
    /// Create a host with the default 50 ms idle budget per callback.
    pub fn new() -> Self {
        Self::with_idle_budget(50.0)
    }

    /// Create a host granting `budget_ms` of idle time per callback.
    pub fn with_idle_budget(budget_ms: f64) -> Self {
        Self {
            clock_ms: Cell::new(0.0),
            idle_budget_ms: Cell::new(budget_ms),
            tasks: RefCell::new(VecDeque::new()),
            idle_callbacks: RefCell::new(VecDeque::new()),
        }
    }

    /// Move the manual clock forward.
    pub fn advance(&self, ms: f64) {
        self.clock_ms.set(self.clock_ms.get() + ms);
    }

    /// Whether any task or idle callback is queued.
    pub fn pending_work(&self) -> bool {
        !self.tasks.borrow().is_empty() || !self.idle_callbacks.borrow().is_empty()
    }

    /// Run the next scheduled unit of work. Returns `false` when both
    /// queues were empty.
    pub fn run_one(&self) -> bool {
        let task = self.tasks.borrow_mut().pop_front();
        if let Some(task) = task {
            task();
            return true;
        }
        let callback = self.idle_callbacks.borrow_mut().pop_front();
        if let Some(callback) = callback {
            let deadline = ManualDeadline {
                host: self,
                end_ms: self.now() + self.idle_budget_ms.get(),
            };
            callback(&deadline);
            return true;
        }
        false
    }

    /// Pump until both queues are empty.
    pub fn run_until_idle(&self) {
        while self.run_one() {}
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for ManualHost {
    fn request_idle_callback(&self, callback: IdleCallback) {
        self.idle_callbacks.borrow_mut().push_back(callback);
    }

    fn schedule_task(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }

    fn now(&self) -> f64 {
        self.clock_ms.get()
    }
}

struct ManualDeadline<'a> {
    host: &'a ManualHost,
    end_ms: f64,
}

impl IdleDeadline for ManualDeadline<'_> {
    fn time_remaining(&self) -> f64 {
        (self.end_ms - self.host.now()).max(0.0)
    }
}
