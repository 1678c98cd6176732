use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// One-shot notification that can be waited on with a timeout. A [`Notification`] starts out unnotified and, once
/// [`Notification::notify`] has been called, it stays notified forever. It is the sole synchronization object that
/// [`crate::wait_ready_interruptible`] creates for each wait, shared between the waiting thread and the callback that
/// is registered on the awaited value.
#[derive(Debug, Default)]
pub(crate) struct Notification {
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl Notification {
    /// Creates a new unnotified [`Notification`].
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks this [`Notification`] as notified, waking up all threads that are waiting on it.
    /// Calling this function more than once has no additional effect.
    pub(crate) fn notify(&self) {
        *self.notified.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.condvar.notify_all();
    }

    /// Blocks the current thread until either this [`Notification`] is notified or `timeout` elapses, returning `true`
    /// in the former case and `false` in the latter. Spurious wake-ups do not shorten the wait. Timeouts that cannot be
    /// represented as an [`Instant`] deadline (e.g., [`Duration::MAX`]) wait until notified.
    pub(crate) fn wait_for_notification_with_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut notified = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
        while !*notified {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    deadline - now
                }
                None => timeout,
            };
            notified = self.condvar.wait_timeout(notified, remaining).unwrap_or_else(PoisonError::into_inner).0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use pretty_assertions::assert_eq;

    use super::Notification;

    #[test]
    fn test_notification() {
        let notification = Notification::new();
        assert_eq!(notification.wait_for_notification_with_timeout(Duration::ZERO), false);

        let start = Instant::now();
        assert_eq!(notification.wait_for_notification_with_timeout(Duration::from_millis(50)), false);
        assert!(start.elapsed() >= Duration::from_millis(50));

        notification.notify();
        notification.notify();
        assert_eq!(notification.wait_for_notification_with_timeout(Duration::ZERO), true);
    }

    #[test]
    fn test_notification_across_threads() {
        let notification = Arc::new(Notification::new());
        let notifier = notification.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            notifier.notify();
        });
        let start = Instant::now();
        assert_eq!(notification.wait_for_notification_with_timeout(Duration::from_secs(10)), true);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_notification_with_unbounded_timeout() {
        let notification = Arc::new(Notification::new());
        let notifier = notification.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            notifier.notify();
        });
        assert_eq!(notification.wait_for_notification_with_timeout(Duration::MAX), true);
        assert_eq!(notification.wait_for_notification_with_timeout(Duration::MAX), true);
    }
}
