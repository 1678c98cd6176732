use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::Error;

/// Callback that is registered via [`AsyncValue::on_ready`] and invoked exactly once, when the corresponding
/// [`AsyncValue`] becomes ready.
type ReadyCallback = Box<dyn FnOnce(Option<Error>) + Send + 'static>;

/// Represents a value that is produced by asynchronous work (e.g., a device computation or a host-to-device
/// transfer) and which transitions exactly once from being _pending_ to being _ready_, optionally carrying an
/// [`Error`] if something went wrong while executing the underlying work.
///
/// [`AsyncValue`]s are reference-counted handles: cloning an [`AsyncValue`] returns a new handle to the _same_
/// underlying value, meaning that the producer of a value and any number of consumers can share it across threads.
/// Consumers can either block on the value via [`AsyncValue::await`], register one-shot callbacks via
/// [`AsyncValue::on_ready`], or use it as a standard [`Future`].
///
/// # Relationship to [`Future`]
///
/// [`AsyncValue`]s implement [`Future`] so that they can be seamlessly integrated with asynchronous Rust code.
/// However, while in Rust [`Future`]s typically do not start executing until they are invoked, [`AsyncValue`]s
/// represent computations that have already started executing.
#[derive(Clone)]
pub struct AsyncValue {
    state: Arc<AsyncValueState>,
}

impl AsyncValue {
    /// Creates a new _pending_ [`AsyncValue`] that must be resolved by its producer using [`AsyncValue::set`].
    pub fn pending() -> Self {
        Self {
            state: Arc::new(AsyncValueState {
                status: Mutex::new(AsyncValueStatus::Pending { callbacks: Vec::new(), wakers: Vec::new() }),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Creates a new [`AsyncValue`] that is already _ready_, carrying the provided optional [`Error`].
    pub fn resolved(error: Option<Error>) -> Self {
        Self {
            state: Arc::new(AsyncValueState {
                status: Mutex::new(AsyncValueStatus::Ready(error)),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Sets/triggers this [`AsyncValue`] to indicate that the work it represents has completed. If an [`Error`] is
    /// provided, it will be returned when this [`AsyncValue`] is awaited, representing that something went wrong while
    /// executing the underlying work. Otherwise, the work will be considered successful.
    ///
    /// All callbacks registered via [`AsyncValue::on_ready`] are invoked on the calling thread, after the value has
    /// been marked as ready. [`AsyncValue`]s can only be set once and so calling this function on a value that is
    /// already ready returns an [`Error::FailedPrecondition`], leaving the existing status untouched.
    pub fn set(&self, error: Option<Error>) -> Result<(), Error> {
        let (callbacks, wakers) = {
            let mut status = self.state.lock();
            if let AsyncValueStatus::Ready(_) = &*status {
                return Err(Error::failed_precondition("the asynchronous value has already been set"));
            }
            match std::mem::replace(&mut *status, AsyncValueStatus::Ready(error.clone())) {
                AsyncValueStatus::Pending { callbacks, wakers } => (callbacks, wakers),
                AsyncValueStatus::Ready(_) => unreachable!(),
            }
        };
        self.state.condvar.notify_all();
        for callback in callbacks {
            callback(error.clone());
        }
        wakers.into_iter().for_each(Waker::wake);
        Ok(())
    }

    /// Returns `true` if the underlying computation of this [`AsyncValue`] has finished executing
    /// (successfully or not), and `false` otherwise.
    pub fn ready(&self) -> bool {
        matches!(&*self.state.lock(), AsyncValueStatus::Ready(_))
    }

    /// Registers the provided callback to be invoked when the underlying computation of this [`AsyncValue`] finishes
    /// executing. The callback takes an optional [`Error`] as its sole argument whose value depends on whether the
    /// underlying computation produced an error or not.
    ///
    /// The callback is invoked at most once and strictly after this value has become ready. If the value is already
    /// ready when this function is called, the callback is invoked immediately on the calling thread.
    pub fn on_ready<F: FnOnce(Option<Error>) + Send + 'static>(&self, callback: F) {
        let error = {
            let mut status = self.state.lock();
            match &mut *status {
                AsyncValueStatus::Pending { callbacks, .. } => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                AsyncValueStatus::Ready(error) => error.clone(),
            }
        };
        callback(error)
    }

    /// Blocks the current thread until this [`AsyncValue`] is _ready_, returning the [`Error`] it carries, if any.
    /// Note that this wait cannot be interrupted. Refer to [`crate::wait_ready_interruptible`] for a wait that can.
    pub fn r#await(&self) -> Result<(), Error> {
        let mut status = self.state.lock();
        loop {
            if let AsyncValueStatus::Ready(error) = &*status {
                return match error {
                    None => Ok(()),
                    Some(error) => Err(error.clone()),
                };
            }
            status = self.state.condvar.wait(status).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Returns an [`Error`] that was encountered while executing the underlying computation of this [`AsyncValue`].
    /// If the underlying computation has already executed and was successful, this function will return `Ok(None)`.
    /// If the underlying computation has not finished executing yet, this function will return
    /// `Err(Error::FailedPrecondition)`. Otherwise, if the underlying computation has finished executing and ran
    /// into an error, this function will return `Ok(Some(error))`, where `error` is the error that was encountered
    /// by the underlying computation.
    pub fn error(&self) -> Result<Option<Error>, Error> {
        match &*self.state.lock() {
            AsyncValueStatus::Ready(error) => Ok(error.clone()),
            AsyncValueStatus::Pending { .. } => Err(Error::failed_precondition(
                "`AsyncValue::ready` must return `true` for `AsyncValue::error` to be meaningful",
            )),
        }
    }

    /// Returns `true` if this [`AsyncValue`] and `other` are handles to the same underlying value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Future for AsyncValue {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Wakers are registered while holding the status lock, and [`AsyncValue::set`] drains them while holding the
        // same lock, and so no wake-up can be lost between checking readiness and registering the waker.
        let mut status = self.state.lock();
        match &mut *status {
            AsyncValueStatus::Ready(None) => Poll::Ready(Ok(())),
            AsyncValueStatus::Ready(Some(error)) => Poll::Ready(Err(error.clone())),
            AsyncValueStatus::Pending { wakers, .. } => {
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl std::fmt::Debug for AsyncValue {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.state.lock() {
            AsyncValueStatus::Pending { callbacks, .. } => {
                write!(formatter, "AsyncValue[pending, {} callback(s)]", callbacks.len())
            }
            AsyncValueStatus::Ready(None) => write!(formatter, "AsyncValue[ready]"),
            AsyncValueStatus::Ready(Some(error)) => write!(formatter, "AsyncValue[ready, error: {}]", error.code()),
        }
    }
}

/// Shared state behind all handles to a single [`AsyncValue`].
struct AsyncValueState {
    /// Current [`AsyncValueStatus`].
    status: Mutex<AsyncValueStatus>,

    /// [`Condvar`] that is notified when the status transitions to [`AsyncValueStatus::Ready`].
    condvar: Condvar,
}

impl AsyncValueState {
    /// Locks the status of this state. Callbacks never run while the lock is held, and so a poisoned lock still
    /// protects a consistent status and it is safe to keep using it.
    fn lock(&self) -> MutexGuard<'_, AsyncValueStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum AsyncValueStatus {
    Pending { callbacks: Vec<ReadyCallback>, wakers: Vec<Waker> },
    Ready(Option<Error>),
}
