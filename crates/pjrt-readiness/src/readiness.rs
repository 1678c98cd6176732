use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::{AsyncValue, Error};

/// Future that tracks when one or more [`Array`](crate::Array)s become ready. A [`ReadyFuture`] is always bound to a
/// single [`AsyncValue`], which may either be the definition value of a single array or a combined value that
/// [`Client::ready_future`](crate::Client::ready_future) derived from multiple arrays. In the latter case, the value
/// only becomes ready once all of its constituents are ready, and it carries the first error any of them reported.
///
/// Resolution of a [`ReadyFuture`] does not imply success; it only implies completion. The terminal status can be read
/// using [`ReadyFuture::await`] once [`ReadyFuture::ready`] returns `true`.
#[derive(Clone, Debug)]
pub struct ReadyFuture {
    value: AsyncValue,
}

impl ReadyFuture {
    /// Creates a new [`ReadyFuture`] bound to the provided [`AsyncValue`].
    pub fn new(value: AsyncValue) -> Self {
        Self { value }
    }

    /// Creates a new [`ReadyFuture`] that has already resolved with the provided status.
    pub fn resolved(status: Result<(), Error>) -> Self {
        Self::new(AsyncValue::resolved(status.err()))
    }

    /// Returns the [`AsyncValue`] that this [`ReadyFuture`] is bound to.
    pub fn value(&self) -> &AsyncValue {
        &self.value
    }

    /// Returns `true` if this [`ReadyFuture`] has resolved (successfully or not).
    pub fn ready(&self) -> bool {
        self.value.ready()
    }

    /// Registers the provided callback to be invoked exactly once, after this [`ReadyFuture`] has resolved.
    /// Refer to [`AsyncValue::on_ready`] for more information.
    pub fn on_ready<F: FnOnce(Option<Error>) + Send + 'static>(&self, callback: F) {
        self.value.on_ready(callback)
    }

    /// Blocks the current thread until this [`ReadyFuture`] has resolved and returns its terminal status.
    /// This wait cannot be interrupted. Refer to [`crate::wait_ready_interruptible`] for a wait that can.
    pub fn r#await(&self) -> Result<(), Error> {
        self.value.r#await()
    }
}

impl From<AsyncValue> for ReadyFuture {
    fn from(value: AsyncValue) -> Self {
        Self::new(value)
    }
}

impl Future for ReadyFuture {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.value).poll(cx)
    }
}
