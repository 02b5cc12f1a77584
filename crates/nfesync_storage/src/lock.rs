//! Advisory file locks held for the duration of one read or write.

use fs2::FileExt;
use std::fs::File;
use std::io;

/// Releases the advisory lock on drop.
///
/// The lock is also released when the file is closed; unlocking explicitly
/// keeps the critical section no longer than the guard's scope.
pub(crate) struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    /// Blocks until a shared lock is acquired.
    pub(crate) fn shared(file: &'a File) -> io::Result<Self> {
        FileExt::lock_shared(file)?;
        Ok(Self { file })
    }

    /// Blocks until an exclusive lock is acquired.
    pub(crate) fn exclusive(file: &'a File) -> io::Result<Self> {
        FileExt::lock_exclusive(file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}
