//! Scoped access to user-selected files.
//!
//! Sandboxed platforms hand out per-file grants that must be taken right
//! before a read and given back right after.  [`AccessGuard`] ties the grant
//! to a scope so it is returned on every exit path, including `?` and
//! panics.

use std::path::{Path, PathBuf};

/// Platform hook for per-file access grants.
pub trait ScopedAccess: Send + Sync {
    /// Try to take a grant for `path`.  `false` means no grant was needed or
    /// none could be taken; [`release`](Self::release) is then not called.
    fn acquire(&self, path: &Path) -> bool;

    /// Return a grant previously taken by [`acquire`](Self::acquire).
    fn release(&self, path: &Path);
}

/// For unsandboxed hosts: never takes a grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScopedAccess;

impl ScopedAccess for NoScopedAccess {
    fn acquire(&self, _path: &Path) -> bool {
        false
    }

    fn release(&self, _path: &Path) {}
}

/// Holds a grant (if one was taken) until dropped.
pub struct AccessGuard<'a> {
    access: &'a dyn ScopedAccess,
    path: PathBuf,
    granted: bool,
}

impl<'a> AccessGuard<'a> {
    pub fn acquire(access: &'a dyn ScopedAccess, path: &Path) -> Self {
        let granted = access.acquire(path);
        if granted {
            log::debug!("burn: access granted for {}", path.display());
        }
        Self {
            access,
            path: path.to_path_buf(),
            granted,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.granted
    }
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        if self.granted {
            self.access.release(&self.path);
            log::debug!("burn: access released for {}", self.path.display());
        }
    }
}
