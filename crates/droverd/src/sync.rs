use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a worker panicked while holding it.
/// Every structure guarded this way is re-derived from disk or re-checked by
/// the caller, so a poisoned value is safe to reuse.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
