//! Serialization of mutating operations

use crate::error::{LedgerError, LedgerResult};
use parking_lot::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// Admits one mutating operation at a time.
///
/// Other threads wait for the operation in flight to finish. The thread that
/// holds the lock (a receiver callback running inside the operation) is
/// refused with [`LedgerError::Reentrancy`] instead of deadlocking.
///
/// Reentry is detected per thread. A receiver that hands a nested call to
/// another thread and returns without waiting gets no error: the nested call
/// simply runs after the outer operation ends. A receiver that hands it off
/// and then blocks on its result deadlocks, since the outer operation never
/// finishes.
#[derive(Default)]
pub(crate) struct OperationLock {
    writer: Mutex<()>,
    holder: Mutex<Option<ThreadId>>,
}

impl OperationLock {
    pub(crate) fn enter(&self) -> LedgerResult<OperationGuard<'_>> {
        let me = thread::current().id();
        if *self.holder.lock() == Some(me) {
            return Err(LedgerError::Reentrancy);
        }
        let writer = self.writer.lock();
        *self.holder.lock() = Some(me);
        Ok(OperationGuard {
            lock: self,
            _writer: writer,
        })
    }

    pub(crate) fn in_progress(&self) -> bool {
        self.holder.lock().is_some()
    }

    pub(crate) fn held_by_current_thread(&self) -> bool {
        *self.holder.lock() == Some(thread::current().id())
    }
}

/// Token for the operation in flight; released on drop
pub(crate) struct OperationGuard<'a> {
    lock: &'a OperationLock,
    _writer: MutexGuard<'a, ()>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        *self.lock.holder.lock() = None;
    }
}
