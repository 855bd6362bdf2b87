use super::StorageBackend;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory backend for tests. Directories are tracked explicitly so that
/// "collection does not exist" behaves the same as on disk.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.state.read().map(|s| s.files.len()).unwrap_or(0)
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "memory backend lock poisoned")
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found", path.file_name().unwrap_or_default().to_string_lossy()),
    )
}

impl StorageBackend for MemoryBackend {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state.files.get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        match path.parent() {
            Some(parent) if state.dirs.contains(parent) => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "parent directory does not exist",
                ))
            }
        }
        state.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.state
            .read()
            .map(|s| s.files.contains_key(path))
            .unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.state
            .read()
            .map(|s| s.dirs.contains(path))
            .unwrap_or(false)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            state.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn list_files(&self, dir: &Path, ext: &str) -> io::Result<Vec<PathBuf>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
            .cloned()
            .collect())
    }
}
