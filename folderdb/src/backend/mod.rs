//! Storage backends.
//!
//! The stores never touch `std::fs` directly; they resolve a sandboxed absolute
//! path with [`crate::path::PathResolver`] and hand it to a [`StorageBackend`].
//! [`FsBackend`] is the real filesystem, [`MemoryBackend`] an in-process double
//! used by tests. Both receive paths that have already passed the sandbox check.

mod fs;
mod memory;

pub use fs::FsBackend;
pub use memory::MemoryBackend;

use std::io;
use std::path::{Path, PathBuf};

/// Minimal file operations the document and asset stores need.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Read a whole file. A missing file is `io::ErrorKind::NotFound`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the file at `path` with `data`. Readers either see the old
    /// content or the new content, never a partial write.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Remove a file. A missing file is `io::ErrorKind::NotFound`.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// True if a regular file exists at `path`.
    fn is_file(&self, path: &Path) -> bool;

    /// True if a directory exists at `path`.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create `path` and any missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Files directly inside `dir` whose extension is `ext` (without the dot).
    /// An absent directory yields an empty list.
    fn list_files(&self, dir: &Path, ext: &str) -> io::Result<Vec<PathBuf>>;
}
