//! Interruptible blocking waits for asynchronous values produced by PJRT-style runtimes.
//!
//! The entry point is [`await_all_ready`], which blocks until a collection of [`Array`]s is ready while polling an
//! [`InterruptSource`], such that users can abandon long waits (e.g., on device computations) without hanging.

pub mod clients;
pub mod errors;
pub mod interrupts;
pub mod readiness;
pub mod values;
pub mod waiter;

pub(crate) mod notifications;

pub use clients::*;
pub use errors::*;
pub use interrupts::*;
pub use readiness::*;
pub use values::*;
pub use waiter::*;
