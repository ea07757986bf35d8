use std::sync::{Mutex, MutexGuard};

use tracing::warn;

// A panicking loader can poison a cache lock; the cached data stays
// structurally valid either way, so recover instead of propagating the panic
// to every later caller.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                "recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}
