use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::clients::GET_READY_FUTURE_ON_DELETED_BUFFER_MESSAGE;
use crate::notifications::Notification;
use crate::{Array, Error, InterruptFlag, InterruptSource, ReadyFuture};

/// Default interval at which blocking waits poll their [`InterruptSource`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Name of the environment variable that [`WaitOptions::from_env`] reads the poll interval from, in milliseconds.
pub const POLL_INTERVAL_ENV_VAR: &str = "PJRT_READINESS_POLL_INTERVAL_MS";

/// Error message reported by [`await_all_ready`] in place of [`GET_READY_FUTURE_ON_DELETED_BUFFER_MESSAGE`], which
/// names the operation that callers actually invoked and which callers match on.
pub const BLOCK_UNTIL_READY_ON_DELETED_BUFFER_MESSAGE: &str =
    "BlockHostUntilReady() called on deleted or donated buffer";

/// Options that can be used to configure blocking waits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WaitOptions {
    /// Interval at which the [`InterruptSource`] is polled while waiting. Shorter intervals make waits more responsive
    /// to interrupt requests, at the cost of more frequent wake-ups. Readiness itself is observed as soon as it occurs,
    /// irrespective of this interval.
    pub poll_interval: Duration,
}

impl WaitOptions {
    /// Returns a copy of these [`WaitOptions`] that use the provided poll interval.
    /// Returns an [`Error::InvalidArgument`] if `poll_interval` is zero, as waits would then spin.
    pub fn with_poll_interval(self, poll_interval: Duration) -> Result<Self, Error> {
        if poll_interval.is_zero() {
            Err(Error::invalid_argument("the wait poll interval must be positive"))
        } else {
            Ok(Self { poll_interval })
        }
    }

    /// Constructs [`WaitOptions`] from the environment. Specifically, if the [`POLL_INTERVAL_ENV_VAR`] environment
    /// variable is set, it is parsed as the poll interval in milliseconds. Otherwise, the default options are returned.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_env_value(std::env::var(POLL_INTERVAL_ENV_VAR).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Result<Self, Error> {
        match value {
            None => Ok(Self::default()),
            Some(value) => {
                let milliseconds = value.trim().parse::<u64>().map_err(|error| {
                    Error::invalid_argument(format!(
                        "invalid value '{value}' for '{POLL_INTERVAL_ENV_VAR}'; expected a positive integer: {error}"
                    ))
                })?;
                Self::default().with_poll_interval(Duration::from_millis(milliseconds))
            }
        }
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self { poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

/// Blocks the current thread until the provided [`ReadyFuture`] has resolved, while remaining responsive to interrupt
/// requests. Specifically, this function registers a callback on the future that notifies a one-shot notification
/// and then waits on that notification, waking up every [`WaitOptions::poll_interval`] to poll `interrupts`.
///
/// Returns `Ok(())` as soon as the future has resolved, irrespective of whether it resolved successfully or not (i.e.,
/// resolution implies completion, not success). If an interrupt is requested before that happens, this function
/// returns an [`Error::Interrupted`] instead. Note that this only abandons the _wait_; the underlying asynchronous
/// computation is not cancelled and may still complete (or fail) later, with nobody observing it.
pub fn wait_ready_interruptible<I: InterruptSource + ?Sized>(
    future: &ReadyFuture,
    interrupts: &I,
    options: &WaitOptions,
) -> Result<(), Error> {
    let notification = Arc::new(Notification::new());
    let callback_notification = notification.clone();
    future.on_ready(move |_| callback_notification.notify());
    let start = Instant::now();
    loop {
        if notification.wait_for_notification_with_timeout(options.poll_interval) {
            return Ok(());
        }
        trace!(elapsed = ?start.elapsed(), "still waiting for a ready future");
        if interrupts.interrupt_requested() {
            warn!(elapsed = ?start.elapsed(), "abandoning wait for a ready future due to an interrupt request");
            return Err(Error::interrupted("interrupted while waiting for asynchronous values to become ready"));
        }
    }
}

/// Blocks the current thread until all of the provided [`Array`]s are ready, while remaining responsive to interrupt
/// requests, and returns their aggregate status.
///
/// If `values` is empty, this function returns `Ok(())` immediately. If it contains a single array, that array's own
/// ready future is awaited. Otherwise, the [`Client`](crate::Client) of the first array is asked to combine the ready
/// futures of all arrays, and so all arrays must be owned by that client. Waiting is performed using
/// [`wait_ready_interruptible`], and so an [`Error::Interrupted`] is returned if an interrupt is requested before all
/// arrays are ready.
///
/// Once all arrays are ready, their status is returned verbatim, with one exception: if the status is an error
/// reporting that a ready future was requested for a deleted or donated buffer, its message is replaced by
/// [`BLOCK_UNTIL_READY_ON_DELETED_BUFFER_MESSAGE`] (keeping its kind), since that is what callers match on.
pub fn await_all_ready<I: InterruptSource + ?Sized>(
    values: &[&dyn Array],
    interrupts: &I,
    options: &WaitOptions,
) -> Result<(), Error> {
    let future = match values {
        [] => return Ok(()),
        [value] => value.ready_future()?,
        values => values[0].client().ready_future(values)?,
    };
    let start = Instant::now();
    debug!(count = values.len(), "waiting for arrays to become ready");
    wait_ready_interruptible(&future, interrupts, options)?;
    debug!(count = values.len(), elapsed = ?start.elapsed(), "arrays are ready");
    future.r#await().map_err(|error| {
        if error.message() == GET_READY_FUTURE_ON_DELETED_BUFFER_MESSAGE {
            debug!(original = error.message(), "rewriting the error message for a deleted or donated buffer");
            error.with_message(BLOCK_UNTIL_READY_ON_DELETED_BUFFER_MESSAGE)
        } else {
            error
        }
    })
}

/// Blocks the current thread until all of the provided [`Array`]s are ready, polling the process-wide
/// [`InterruptFlag::global`] for interrupt requests and using the default [`WaitOptions`].
/// Refer to [`await_all_ready`] for more information.
pub fn block_until_ready(values: &[&dyn Array]) -> Result<(), Error> {
    await_all_ready(values, InterruptFlag::global(), &WaitOptions::default())
}
