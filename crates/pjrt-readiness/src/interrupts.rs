use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Source of interrupt requests that is polled (i.e., never pushed) by blocking waits, such as
/// [`crate::wait_ready_interruptible`]. Implementations must be safe to query from any thread and
/// [`InterruptSource::interrupt_requested`] must never block.
pub trait InterruptSource: Send + Sync {
    /// Returns `true` if an interrupt has been requested and any blocking wait that polls this source should be
    /// abandoned.
    fn interrupt_requested(&self) -> bool;
}

/// Lock-free [`InterruptSource`] that is raised and cleared explicitly. Reading the flag does not reset it, and so all
/// waits that poll the same [`InterruptFlag`] observe the same request until [`InterruptFlag::clear`] is called.
///
/// A process-wide instance is available via [`InterruptFlag::global`], which is what [`crate::block_until_ready`]
/// polls. Embedders typically raise it from wherever they receive user cancellation requests (e.g., a console
/// handler).
#[derive(Debug, Default)]
pub struct InterruptFlag {
    raised: AtomicBool,
}

static GLOBAL_INTERRUPT_FLAG: InterruptFlag = InterruptFlag::new();

impl InterruptFlag {
    /// Creates a new [`InterruptFlag`] that is not raised.
    pub const fn new() -> Self {
        Self { raised: AtomicBool::new(false) }
    }

    /// Returns the process-wide [`InterruptFlag`].
    pub fn global() -> &'static Self {
        &GLOBAL_INTERRUPT_FLAG
    }

    /// Raises this flag, requesting that all waits polling it be abandoned.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Clears this flag so that subsequent waits are no longer interrupted.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Returns `true` if this flag is currently raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

impl InterruptSource for InterruptFlag {
    fn interrupt_requested(&self) -> bool {
        self.is_raised()
    }
}

/// [`InterruptSource`] that never requests an interrupt.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NeverInterrupted;

impl InterruptSource for NeverInterrupted {
    fn interrupt_requested(&self) -> bool {
        false
    }
}

impl<T: InterruptSource + ?Sized> InterruptSource for &T {
    fn interrupt_requested(&self) -> bool {
        (**self).interrupt_requested()
    }
}

impl<T: InterruptSource + ?Sized> InterruptSource for Arc<T> {
    fn interrupt_requested(&self) -> bool {
        (**self).interrupt_requested()
    }
}

/// [`InterruptSource`] backed by a closure, created using [`interrupt_fn`].
#[derive(Copy, Clone)]
pub struct InterruptFn<F> {
    function: F,
}

/// Creates a new [`InterruptSource`] that invokes `function` every time it is polled.
pub fn interrupt_fn<F: Fn() -> bool + Send + Sync>(function: F) -> InterruptFn<F> {
    InterruptFn { function }
}

impl<F: Fn() -> bool + Send + Sync> InterruptSource for InterruptFn<F> {
    fn interrupt_requested(&self) -> bool {
        (self.function)()
    }
}
