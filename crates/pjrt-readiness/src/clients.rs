use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error};

use crate::{AsyncValue, Error, ReadyFuture};

/// Error message that the runtime reports when a ready future is requested for an [`Array`] that has already been
/// deleted or donated.
pub const GET_READY_FUTURE_ON_DELETED_BUFFER_MESSAGE: &str = "GetReadyFuture() called on deleted or donated buffer";

/// Owner of [`Array`]s that knows how to track their readiness. [`Client`]s are the only place where readiness of
/// multiple arrays is combined into a single [`ReadyFuture`]; waiters never implement that fan-in themselves.
pub trait Client: Send + Sync {
    /// Returns the name of this [`Client`] (e.g., the platform it targets), used for diagnostics.
    fn name(&self) -> &str;

    /// Returns a [`ReadyFuture`] that resolves only once all of the provided [`Array`]s are ready, carrying the first
    /// error that any of them reported, if any. All of the provided arrays must be owned by this [`Client`].
    /// Returns an [`Error::InvalidArgument`] if `values` is empty.
    fn ready_future(&self, values: &[&dyn Array]) -> Result<ReadyFuture, Error>;
}

/// Array (i.e., a potentially asynchronously populated device buffer) owned by a [`Client`].
pub trait Array: Send + Sync {
    /// Returns the [`Client`] that owns this [`Array`].
    fn client(&self) -> &dyn Client;

    /// Returns a [`ReadyFuture`] that is triggered when either the data in this [`Array`] becomes ready
    /// (i.e., after an asynchronous operation like a copy completes), or an error occurs.
    fn ready_future(&self) -> Result<ReadyFuture, Error>;
}

/// In-process [`Client`] whose [`LocalArray`]s are backed directly by [`AsyncValue`]s. This is useful for embedders
/// that produce values on host threads, as well as for testing code that waits on arrays without requiring an
/// accelerator runtime.
#[derive(Clone, Debug)]
pub struct LocalClient {
    name: Arc<str>,
}

impl LocalClient {
    /// Creates a new [`LocalClient`] with the provided name.
    pub fn new<N: AsRef<str>>(name: N) -> Self {
        Self { name: Arc::from(name.as_ref()) }
    }

    /// Creates a new [`LocalArray`] owned by this [`LocalClient`] that becomes ready when `definition` does.
    pub fn array(&self, definition: AsyncValue) -> LocalArray {
        LocalArray { client: self.clone(), definition, deleted: AtomicBool::new(false) }
    }

    /// Creates a new [`LocalArray`] owned by this [`LocalClient`] along with the (pending) [`AsyncValue`] that must be
    /// set in order for that array to become ready.
    pub fn pending_array(&self) -> (LocalArray, AsyncValue) {
        let definition = AsyncValue::pending();
        (self.array(definition.clone()), definition)
    }
}

impl Default for LocalClient {
    fn default() -> Self {
        Self::new("local")
    }
}

impl Client for LocalClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn ready_future(&self, values: &[&dyn Array]) -> Result<ReadyFuture, Error> {
        match values {
            [] => Err(Error::invalid_argument("cannot construct a ready future for an empty collection of arrays")),
            [value] => value.ready_future(),
            values => {
                let futures = values.iter().map(|value| value.ready_future()).collect::<Result<Vec<_>, _>>()?;
                debug!(client = %self.name, count = futures.len(), "combining array ready futures");
                let combined = AsyncValue::pending();
                let join = Arc::new(JoinState {
                    remaining: AtomicUsize::new(futures.len()),
                    first_error: Mutex::new(None),
                });
                for future in &futures {
                    let join = join.clone();
                    let combined = combined.clone();
                    future.on_ready(move |error| {
                        if let Some(error) = error {
                            join.first_error.lock().unwrap_or_else(PoisonError::into_inner).get_or_insert(error);
                        }
                        if join.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            let first_error = join.first_error.lock().unwrap_or_else(PoisonError::into_inner).take();

                            // The countdown reaches zero exactly once and so this can only fail if something else
                            // already set the combined value. There is nowhere to propagate that failure to from
                            // within this callback.
                            if let Err(set_error) = combined.set(first_error) {
                                error!(error = %set_error, "failed to resolve a combined ready future");
                            }
                        }
                    });
                }
                Ok(ReadyFuture::new(combined))
            }
        }
    }
}

/// State shared by the callbacks that [`LocalClient::ready_future`] registers on the values it combines.
struct JoinState {
    /// Number of values that have not become ready yet.
    remaining: AtomicUsize,

    /// First [`Error`] reported by any of the combined values, in the order in which they became ready.
    first_error: Mutex<Option<Error>>,
}

/// [`Array`] owned by a [`LocalClient`].
///
/// Note that [`LocalArray`]s may become _deleted_, either explicitly via [`LocalArray::delete`] or implicitly when
/// they are _donated_ via [`LocalArray::donate`]. Ready futures requested for a deleted array resolve immediately with
/// an [`Error::InvalidArgument`]. However, ready futures obtained _before_ deletion keep tracking the underlying
/// definition value.
#[derive(Debug)]
pub struct LocalArray {
    client: LocalClient,
    definition: AsyncValue,
    deleted: AtomicBool,
}

impl LocalArray {
    /// Deletes this [`LocalArray`]. Deleting an array that is already deleted has no effect.
    pub fn delete(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    /// Returns `true` if and only if this [`LocalArray`] has been deleted or donated.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// _Donates_ this [`LocalArray`], returning a new [`LocalArray`] that shares its definition and marking this one
    /// as deleted. Donating an array that has already been deleted or donated returns an [`Error::InvalidArgument`].
    pub fn donate(&self) -> Result<LocalArray, Error> {
        if self.deleted.swap(true, Ordering::AcqRel) {
            Err(Error::invalid_argument("cannot donate an array that has already been deleted or donated"))
        } else {
            Ok(self.client.array(self.definition.clone()))
        }
    }
}

impl Array for LocalArray {
    fn client(&self) -> &dyn Client {
        &self.client
    }

    fn ready_future(&self) -> Result<ReadyFuture, Error> {
        if self.is_deleted() {
            Ok(ReadyFuture::resolved(Err(Error::invalid_argument(GET_READY_FUTURE_ON_DELETED_BUFFER_MESSAGE))))
        } else {
            Ok(ReadyFuture::new(self.definition.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use crate::tests::resolve_after;
    use crate::{
        Array, AsyncValue, Client, Error, ErrorCode, GET_READY_FUTURE_ON_DELETED_BUFFER_MESSAGE, LocalArray,
        LocalClient,
    };

    #[test]
    fn test_local_client() {
        let client = LocalClient::new("test");
        assert_eq!(client.name(), "test");
        assert_eq!(LocalClient::default().name(), "local");

        let array = client.array(AsyncValue::resolved(None));
        assert_eq!(array.client().name(), "test");
        assert_eq!(array.ready_future().unwrap().r#await(), Ok(()));

        assert!(matches!(client.ready_future(&[]), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_local_client_ready_future_single_array() {
        let client = LocalClient::default();
        let (array, definition) = client.pending_array();
        let future = client.ready_future(&[&array]).unwrap();
        assert!(future.value().ptr_eq(&definition));
    }

    #[test]
    fn test_local_client_ready_future_combines_arrays() {
        let client = LocalClient::default();
        let (array_0, definition_0) = client.pending_array();
        let (array_1, definition_1) = client.pending_array();
        let (array_2, definition_2) = client.pending_array();
        let future = client.ready_future(&[&array_0, &array_1, &array_2]).unwrap();
        assert_eq!(future.ready(), false);

        assert_eq!(definition_1.set(None), Ok(()));
        assert_eq!(future.ready(), false);
        assert_eq!(definition_0.set(None), Ok(()));
        assert_eq!(future.ready(), false);
        assert_eq!(definition_2.set(None), Ok(()));
        assert_eq!(future.ready(), true);
        assert_eq!(future.r#await(), Ok(()));
    }

    #[test]
    fn test_local_client_ready_future_reports_first_error() {
        let client = LocalClient::default();
        let (array_0, definition_0) = client.pending_array();
        let (array_1, definition_1) = client.pending_array();
        let (array_2, definition_2) = client.pending_array();
        let future = client.ready_future(&[&array_0, &array_1, &array_2]).unwrap();

        assert_eq!(definition_2.set(Some(Error::internal("second array failed"))), Ok(()));
        assert_eq!(definition_0.set(Some(Error::aborted("first array failed"))), Ok(()));
        assert_eq!(future.ready(), false);
        assert_eq!(definition_1.set(None), Ok(()));

        let error = future.r#await().unwrap_err();
        assert_eq!(error.code(), ErrorCode::Internal);
        assert_eq!(error.message(), "second array failed");
    }

    #[test]
    fn test_local_client_ready_future_across_threads() {
        let client = LocalClient::default();
        let arrays = (0..8).map(|_| client.pending_array()).collect::<Vec<_>>();
        let array_refs = arrays.iter().map(|(array, _)| array as &dyn Array).collect::<Vec<_>>();
        let future = client.ready_future(&array_refs).unwrap();
        for (i, (_, definition)) in arrays.iter().enumerate() {
            resolve_after(definition.clone(), Duration::from_millis(10 * i as u64), None);
        }
        assert_eq!(future.r#await(), Ok(()));
        assert!(arrays.iter().all(|(_, definition)| definition.ready()));
    }

    #[test]
    fn test_local_array_delete_and_donate() {
        let client = LocalClient::default();
        let (array, definition) = client.pending_array();
        let future_before_deletion = array.ready_future().unwrap();
        assert_eq!(array.is_deleted(), false);

        let donated: LocalArray = array.donate().unwrap();
        assert_eq!(array.is_deleted(), true);
        assert_eq!(donated.is_deleted(), false);
        assert!(matches!(array.donate(), Err(Error::InvalidArgument { .. })));

        let error = array.ready_future().unwrap().r#await().unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidArgument);
        assert_eq!(error.message(), GET_READY_FUTURE_ON_DELETED_BUFFER_MESSAGE);

        // Futures obtained before deletion keep tracking the definition value.
        assert_eq!(future_before_deletion.ready(), false);
        assert_eq!(definition.set(None), Ok(()));
        assert_eq!(future_before_deletion.r#await(), Ok(()));
        assert_eq!(donated.ready_future().unwrap().r#await(), Ok(()));

        donated.delete();
        donated.delete();
        assert_eq!(donated.is_deleted(), true);
        assert_eq!(donated.ready_future().unwrap().r#await().unwrap_err().code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_local_client_ready_future_with_deleted_array() {
        let client = LocalClient::default();
        let (array_0, definition_0) = client.pending_array();
        let (array_1, _) = client.pending_array();
        array_1.delete();
        let future = client.ready_future(&[&array_0, &array_1]).unwrap();
        assert_eq!(future.ready(), false);
        assert_eq!(definition_0.set(None), Ok(()));
        let error = future.r#await().unwrap_err();
        assert_eq!(error.message(), GET_READY_FUTURE_ON_DELETED_BUFFER_MESSAGE);
    }
}
