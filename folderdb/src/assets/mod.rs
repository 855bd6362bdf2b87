// Image asset storage - one file per id, extension from a fixed allow-list

use crate::error::{FolderDbError, Result};
use crate::store::Store;
use std::io;
use std::path::{Path, PathBuf};

/// Allowed extensions, in the order retrieval probes them.
pub const IMAGE_EXTENSIONS: [&str; 7] = [".png", ".jpg", ".jpeg", ".gif", ".bmp", ".webp", ".svg"];

/// A retrieved asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    /// Matched extension, including the leading dot.
    pub extension: &'static str,
}

/// MIME type for an extension (leading dot optional, any case).
pub fn mime_for_extension(ext: &str) -> &'static str {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Normalise the extension of a declared file name against the allow-list.
/// Returns the canonical lowercase entry, e.g. `"Photo.PNG"` gives `".png"`.
pub fn allowed_extension(file_name: &str) -> Result<&'static str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.trim().is_empty())
        .ok_or(FolderDbError::MissingExtension)?;

    let dotted = format!(".{}", ext.to_ascii_lowercase());
    IMAGE_EXTENSIONS
        .iter()
        .copied()
        .find(|allowed| *allowed == dotted)
        .ok_or_else(|| FolderDbError::InvalidExtension(format!(".{ext}")))
}

/// Binary assets kept under `<root>/<images_folder>/<id><ext>`.
///
/// At most one file exists per id: storing an id under a new extension
/// removes the file it had under any other allowed extension.
#[derive(Debug)]
pub struct AssetStore<'a> {
    store: &'a Store,
}

impl<'a> AssetStore<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        AssetStore { store }
    }

    fn folder(&self) -> &str {
        self.store.config().images_folder()
    }

    fn path_for(&self, id: &str, ext: &str) -> Result<PathBuf> {
        self.store.resolver().asset_path(self.folder(), id, ext)
    }

    /// Store `bytes` under `id` (or a generated id), taking the extension from
    /// `file_name`. Returns the id.
    pub fn store(&self, id: Option<&str>, bytes: &[u8], file_name: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(FolderDbError::EmptyFile);
        }
        let ext = allowed_extension(file_name)?;

        let id = match id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => self.store.generate_id(),
        };

        let destination = self.path_for(&id, ext)?;
        let backend = self.store.backend();

        if let Some(dir) = destination.parent() {
            backend.create_dir_all(dir)?;
        }
        backend.write(&destination, bytes)?;

        for other in IMAGE_EXTENSIONS.iter().filter(|e| **e != ext) {
            let stale = self.path_for(&id, other)?;
            if backend.is_file(&stale) {
                match backend.remove(&stale) {
                    Ok(()) => log::debug!("Removed stale asset {id}{other}"),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        log::debug!("Stored asset {id}{ext} ({} bytes)", bytes.len());
        Ok(id)
    }

    /// Fetch an asset by id, probing each allowed extension in order.
    pub fn retrieve(&self, id: &str) -> Result<Asset> {
        if id.trim().is_empty() {
            return Err(FolderDbError::MissingParameter("id"));
        }
        let not_found = || FolderDbError::not_found(self.folder(), id);

        let dir = self.store.resolver().collection_dir(self.folder())?;
        let backend = self.store.backend();
        if !backend.is_dir(&dir) {
            return Err(not_found());
        }

        for ext in IMAGE_EXTENSIONS {
            let candidate = self.path_for(id, ext)?;
            if !backend.is_file(&candidate) {
                continue;
            }
            return match backend.read(&candidate) {
                Ok(bytes) => Ok(Asset {
                    bytes,
                    mime_type: mime_for_extension(ext),
                    extension: ext,
                }),
                // Removed between the probe and the read.
                Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found()),
                Err(e) => Err(e.into()),
            };
        }

        Err(not_found())
    }
}
