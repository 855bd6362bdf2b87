// Path resolution and sandboxing - every on-disk location goes through here

use crate::error::{FolderDbError, Result};
use std::path::{Component, Path, PathBuf};

/// Maps caller-supplied names onto absolute paths below a fixed root.
///
/// Resolution is purely lexical: nothing is read from disk and symlinks are not
/// followed. A resolved path is accepted only when it is the root itself or lies
/// below it, compared component by component (case-sensitive on every platform).
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for `root`. The root must be absolute.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(FolderDbError::Config(
                "storage root must be an absolute path".into(),
            ));
        }
        Ok(PathResolver {
            root: normalize(&root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `segments` onto the root, normalise, and check containment.
    ///
    /// Every segment is validated with [`validate_segment`] first, so separators,
    /// `..` and absolute markers are rejected even when normalisation alone would
    /// have kept the result inside the root.
    pub fn resolve(&self, segments: &[&str]) -> Result<PathBuf> {
        let mut joined = self.root.clone();
        for segment in segments {
            validate_segment(segment)?;
            joined.push(segment);
        }

        let normalized = normalize(&joined);
        if self.contains(&normalized) {
            Ok(normalized)
        } else {
            Err(FolderDbError::InvalidPath)
        }
    }

    /// Directory holding a collection's documents.
    pub fn collection_dir(&self, collection: &str) -> Result<PathBuf> {
        self.resolve(&[collection])
    }

    /// `<root>/<collection>/<id>.json`
    pub fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        validate_segment(id)?;
        self.resolve(&[collection, &format!("{id}.json")])
    }

    /// `<root>/<dir>/<id><ext>`, where `ext` includes its leading dot.
    pub fn asset_path(&self, dir: &str, id: &str, ext: &str) -> Result<PathBuf> {
        validate_segment(id)?;
        self.resolve(&[dir, &format!("{id}{ext}")])
    }

    /// True if `path` (already normalised) is the root or a descendant of it.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// Reject anything that is not a single plain file or directory name.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(FolderDbError::InvalidPath);
    }
    if segment.contains(['/', '\\', '\0']) {
        return Err(FolderDbError::InvalidPath);
    }
    if has_drive_prefix(segment) {
        return Err(FolderDbError::InvalidPath);
    }
    // Anything `Path` itself treats as more than one normal component.
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(FolderDbError::InvalidPath),
    }
}

fn has_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Lexical normalisation: drops `.`, lets `..` pop the previous component.
/// `..` can never climb above the filesystem root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver() -> PathResolver {
        PathResolver::new("/srv/data").unwrap()
    }

    #[test]
    fn test_document_path() {
        let path = resolver().document_path("users", "abc").unwrap();
        assert_eq!(path, PathBuf::from("/srv/data/users/abc.json"));
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let r = resolver();
        assert!(matches!(
            r.document_path("..", "passwd"),
            Err(FolderDbError::InvalidPath)
        ));
        assert!(matches!(
            r.document_path("users", ".."),
            Err(FolderDbError::InvalidPath)
        ));
        assert!(matches!(
            r.collection_dir("users/../../etc"),
            Err(FolderDbError::InvalidPath)
        ));
    }

    #[test]
    fn test_rejects_separators_and_absolute_markers() {
        let r = resolver();
        for bad in ["a/b", "a\\b", "/etc", "C:", "c:\\windows", "", ".", "nul\0"] {
            assert!(
                matches!(r.collection_dir(bad), Err(FolderDbError::InvalidPath)),
                "segment {bad:?} should be rejected"
            );
            assert!(
                matches!(r.document_path("users", bad), Err(FolderDbError::InvalidPath)),
                "id {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_dots_inside_names_are_fine() {
        let r = resolver();
        let path = r.document_path("v1.2", "a..b").unwrap();
        assert_eq!(path, PathBuf::from("/srv/data/v1.2/a..b.json"));
    }

    #[test]
    fn test_root_must_be_absolute() {
        assert!(PathResolver::new("relative/dir").is_err());
    }

    #[test]
    fn test_root_is_normalized() {
        let r = PathResolver::new("/srv/./data/../data").unwrap();
        assert_eq!(r.root(), Path::new("/srv/data"));
        assert!(r.contains(Path::new("/srv/data")));
        assert!(!r.contains(Path::new("/srv/database")));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/../..")), PathBuf::from("/"));
    }
}
