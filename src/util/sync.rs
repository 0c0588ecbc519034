//! Poison-recovering lock guards.
//!
//! A panicking thread poisons std locks; the shared state guarded here (cache
//! entries, the store root) stays structurally valid after any panic, so every
//! caller recovers the guard instead of propagating the poison.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn read_or_recover<'a, T>(
    lock: &'a RwLock<T>,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(op, lock_kind = "rwlock.read", "lock poisoned; recovering guard");
        poisoned.into_inner()
    })
}

pub(crate) fn write_or_recover<'a, T>(
    lock: &'a RwLock<T>,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(op, lock_kind = "rwlock.write", "lock poisoned; recovering guard");
        poisoned.into_inner()
    })
}

pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(op, lock_kind = "mutex", "lock poisoned; recovering guard");
        poisoned.into_inner()
    })
}
