//! Scoped batch mode.

use std::ops::{Deref, DerefMut};
use tracing::error;

use super::{Database, DbResult};

/// Batch mode held for the guard's lifetime.
///
/// Dereferences to the [`Database`], so writes go through the guard.
/// Batch mode is left exactly once: by [`BatchGuard::release`], or on drop
/// if the guard is abandoned (for example by an early return).
pub struct BatchGuard<'a> {
    db: &'a mut Database,
    released: bool,
}

impl Database {
    /// Enter batch mode until the returned guard is released or dropped.
    pub fn batch(&mut self) -> BatchGuard<'_> {
        self.enter_batch_mode();
        BatchGuard {
            db: self,
            released: false,
        }
    }
}

impl BatchGuard<'_> {
    /// Leave batch mode, reporting any failure of the index rebuild.
    pub fn release(mut self) -> DbResult<()> {
        self.released = true;
        self.db.exit_batch_mode()
    }
}

impl Deref for BatchGuard<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
    }
}

impl DerefMut for BatchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        self.db
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.db.exit_batch_mode() {
            error!(error = %e, "Failed to rebuild search index after batch");
        }
    }
}
