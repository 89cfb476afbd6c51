// ABOUTME: Shared mutex helper for the crate's in-memory stores
// ABOUTME: Recovers the guard from a poisoned lock instead of propagating the panic

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, recovering the data if a previous holder panicked.
///
/// Critical sections across the crate only insert or remove whole entries, so
/// the data behind a poisoned lock is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
