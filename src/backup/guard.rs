//! Scoped suspension of referential checks.

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::backup::access::TableAccess;
use crate::backup::types::BackupResult;

/// Holds referential checks off for as long as it lives.
///
/// Checks are re-enabled when the guard drops, whether the import committed,
/// rolled back, or unwound. The guard derefs to the underlying store so all
/// work done while checks are suspended goes through it.
pub struct ReferentialChecksSuspended<'a, A: TableAccess + ?Sized> {
    access: &'a mut A,
}

impl<'a, A: TableAccess + ?Sized> ReferentialChecksSuspended<'a, A> {
    /// Disable referential checks on `access`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the change. Nothing needs
    /// restoring in that case.
    pub fn acquire(access: &'a mut A) -> BackupResult<Self> {
        access.disable_referential_checks()?;
        Ok(Self { access })
    }
}

impl<A: TableAccess + ?Sized> Deref for ReferentialChecksSuspended<'_, A> {
    type Target = A;

    fn deref(&self) -> &A {
        &*self.access
    }
}

impl<A: TableAccess + ?Sized> DerefMut for ReferentialChecksSuspended<'_, A> {
    fn deref_mut(&mut self) -> &mut A {
        &mut *self.access
    }
}

impl<A: TableAccess + ?Sized> Drop for ReferentialChecksSuspended<'_, A> {
    fn drop(&mut self) {
        if let Err(e) = self.access.enable_referential_checks() {
            warn!(error = %e, "failed to re-enable referential checks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_checks_restored_on_drop() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        {
            let guard = ReferentialChecksSuspended::acquire(&mut storage).unwrap();
            assert!(!guard.referential_checks_enabled().unwrap());
        }
        assert!(storage.referential_checks_enabled().unwrap());
    }

    #[test]
    fn test_checks_restored_on_early_return() {
        fn fails(storage: &mut SqliteStorage) -> BackupResult<()> {
            let mut guard = ReferentialChecksSuspended::acquire(storage)?;
            guard.delete_all("no_such_table")?;
            Ok(())
        }

        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(fails(&mut storage).is_err());
        assert!(storage.referential_checks_enabled().unwrap());
    }
}
