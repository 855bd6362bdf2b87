use crate::assets::AssetStore;
use crate::auth::Credentials;
use crate::backend::{FsBackend, StorageBackend};
use crate::config::StorageConfig;
use crate::document::{self, DocumentObject, ScanReport};
use crate::error::{FolderDbError, Result};
use crate::filter::{self, Filter, Operator};
use crate::path::{self, PathResolver};
use serde_json::Value;
use std::io;
use std::path::Path;

/// The main entry point for FolderDB.
/// Owns the sandboxed storage root and the backend, and hands out
/// collection, asset and credential handles.
#[derive(Debug)]
pub struct Store {
    resolver: PathResolver,
    backend: Box<dyn StorageBackend>,
    config: StorageConfig,
}

impl Store {
    /// Open a store on the local filesystem, creating the root directory if needed.
    pub fn open(config: StorageConfig) -> Result<Self> {
        Self::with_backend(config, FsBackend::new())
    }

    /// Open a store rooted at `path` with default settings otherwise.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StorageConfig {
            base_directory: path.as_ref().to_path_buf(),
            ..StorageConfig::default()
        })
    }

    /// Open a store over any backend (e.g. [`crate::backend::MemoryBackend`] in tests).
    pub fn with_backend(config: StorageConfig, backend: impl StorageBackend + 'static) -> Result<Self> {
        let root = config.resolved_root()?;
        let resolver = PathResolver::new(root)?;
        path::validate_segment(config.images_folder())
            .map_err(|_| FolderDbError::Config("images_folder must be a plain folder name".into()))?;

        backend.create_dir_all(resolver.root())?;
        log::debug!("Opened store at {}", resolver.root().display());

        Ok(Store {
            resolver,
            backend: Box::new(backend),
            config,
        })
    }

    /// Get a handle to a collection. The collection does not need to exist yet.
    pub fn collection(&self, name: &str) -> Result<Collection<'_>> {
        if name.trim().is_empty() {
            return Err(FolderDbError::MissingParameter("collection"));
        }
        path::validate_segment(name)?;
        Ok(Collection {
            store: self,
            name: name.to_string(),
        })
    }

    /// Image asset store under the configured images folder.
    pub fn assets(&self) -> AssetStore<'_> {
        AssetStore::new(self)
    }

    /// Credential store over the reserved `user` collection.
    pub fn credentials(&self) -> Credentials<'_> {
        Credentials::new(self)
    }

    /// Get the absolute storage root
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub(crate) fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub(crate) fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub(crate) fn generate_id(&self) -> String {
        self.config.id_strategy.generate()
    }
}

/// A handle to a collection within a store.
/// Documents are raw JSON text on disk; list and search only surface objects.
#[derive(Debug)]
pub struct Collection<'a> {
    store: &'a Store,
    name: String,
}

impl<'a> Collection<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn document_path(&self, id: &str) -> Result<std::path::PathBuf> {
        if id.trim().is_empty() {
            return Err(FolderDbError::MissingParameter("id"));
        }
        self.store.resolver().document_path(&self.name, id)
    }

    fn missing(&self, id: &str) -> impl FnOnce(io::Error) -> FolderDbError + '_ {
        let id = id.to_string();
        move |e| {
            if e.kind() == io::ErrorKind::NotFound {
                FolderDbError::not_found(&self.name, &id)
            } else {
                FolderDbError::Io(e)
            }
        }
    }

    /// Read a document's bytes exactly as stored.
    pub fn get(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.document_path(id)?;
        self.store.backend().read(&path).map_err(self.missing(id))
    }

    /// All object documents in the collection. An absent collection is empty.
    pub fn list(&self) -> Result<Vec<Value>> {
        Ok(self.list_report()?.documents)
    }

    /// Like [`Collection::list`], also reporting how many files were skipped.
    pub fn list_report(&self) -> Result<ScanReport> {
        self.scan(|_| true)
    }

    /// Write a document under `id`, replacing any existing one.
    pub fn create(&self, id: &str, content: &str) -> Result<String> {
        let path = self.document_path(id)?;
        document::validate_json(content)?;

        if let Some(dir) = path.parent() {
            self.store.backend().create_dir_all(dir)?;
        }
        self.store.backend().write(&path, content.as_bytes())?;
        log::debug!("Wrote {}/{}.json", self.name, id);
        Ok(id.to_string())
    }

    /// Create a document under a freshly generated id. When the content is a
    /// JSON object the id is also written into its `"id"` field.
    pub fn insert(&self, content: &str) -> Result<String> {
        document::validate_json(content)?;
        let id = self.store.generate_id();

        match serde_json::from_str::<Value>(content)? {
            Value::Object(mut object) => {
                object.insert("id".to_string(), Value::String(id.clone()));
                let stamped = serde_json::to_string(&object)?;
                self.create(&id, &stamped)
            }
            _ => self.create(&id, content),
        }
    }

    /// Replace an existing document. Fails with `NotFound` if it does not exist.
    pub fn update(&self, id: &str, content: &str) -> Result<()> {
        let path = self.document_path(id)?;
        if !self.store.backend().is_file(&path) {
            return Err(FolderDbError::not_found(&self.name, id));
        }
        document::validate_json(content)?;

        self.store.backend().write(&path, content.as_bytes())?;
        log::debug!("Updated {}/{}.json", self.name, id);
        Ok(())
    }

    /// Delete a document by id.
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.document_path(id)?;
        self.store.backend().remove(&path).map_err(self.missing(id))?;
        log::debug!("Deleted {}/{}.json", self.name, id);
        Ok(())
    }

    /// Documents whose `field` equals `value`, ignoring case.
    pub fn search(&self, field: &str, value: &str) -> Result<Vec<Value>> {
        if field.trim().is_empty() {
            return Err(FolderDbError::MissingParameter("field"));
        }
        if value.trim().is_empty() {
            return Err(FolderDbError::MissingParameter("value"));
        }
        self.complex_search(&[Filter::new(field, Operator::Equals, value)])
    }

    /// Documents matching every filter.
    pub fn complex_search(&self, filters: &[Filter]) -> Result<Vec<Value>> {
        Ok(self.complex_search_report(filters)?.documents)
    }

    /// Like [`Collection::complex_search`], also reporting skipped files.
    pub fn complex_search_report(&self, filters: &[Filter]) -> Result<ScanReport> {
        if filters.is_empty() {
            return Err(FolderDbError::EmptyFilterSet);
        }
        self.scan(|object| filter::matches_all(object, filters))
    }

    /// Best-effort pass over every `*.json` file in the collection directory.
    pub(crate) fn scan(&self, keep: impl Fn(&DocumentObject) -> bool) -> Result<ScanReport> {
        let dir = self.store.resolver().collection_dir(&self.name)?;
        let backend = self.store.backend();

        let mut report = ScanReport::default();
        if !backend.is_dir(&dir) {
            return Ok(report);
        }

        for file in backend.list_files(&dir, "json")? {
            report.push(backend.read(&file), &keep);
        }

        if report.skipped > 0 {
            log::debug!(
                "Scan of '{}' skipped {} unreadable or non-object file(s)",
                self.name,
                report.skipped
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup_test_store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let store = Store::open_path(tmp.path()).unwrap();
        (tmp, store)
    }

    fn memory_store() -> Store {
        let config = StorageConfig {
            base_directory: "/mem/data".into(),
            ..StorageConfig::default()
        };
        Store::with_backend(config, MemoryBackend::new()).unwrap()
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let (_tmp, store) = setup_test_store();
        let users = store.collection("users").unwrap();

        let content = "{ \"name\": \"Alice\",\n  \"age\": 30 }";
        let id = users.create("alice", content).unwrap();
        assert_eq!(id, "alice");
        assert_eq!(users.get("alice").unwrap(), content.as_bytes());
    }

    #[test]
    fn test_create_overwrites_existing() {
        let (_tmp, store) = setup_test_store();
        let users = store.collection("users").unwrap();

        users.create("alice", r#"{"v":1}"#).unwrap();
        users.create("alice", r#"{"v":2}"#).unwrap();
        assert_eq!(users.get("alice").unwrap(), br#"{"v":2}"#);
        assert_eq!(users.list().unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_invalid_json() {
        let (tmp, store) = setup_test_store();
        let users = store.collection("users").unwrap();

        let result = users.create("alice", "{name: alice}");
        assert!(matches!(result, Err(FolderDbError::InvalidContent(_))));
        assert!(!tmp.path().join("users/alice.json").exists());
    }

    #[test]
    fn test_non_object_documents_are_stored_but_not_listed() {
        let (_tmp, store) = setup_test_store();
        let items = store.collection("items").unwrap();

        items.create("list", "[1, 2, 3]").unwrap();
        items.create("obj", r#"{"a": 1}"#).unwrap();

        assert_eq!(items.get("list").unwrap(), b"[1, 2, 3]");
        assert_eq!(items.list().unwrap(), vec![json!({"a": 1})]);
    }

    #[test]
    fn test_update_requires_existing() {
        let (_tmp, store) = setup_test_store();
        let users = store.collection("users").unwrap();

        let result = users.update("ghost", r#"{"a":1}"#);
        assert!(matches!(result, Err(FolderDbError::NotFound { .. })));

        users.create("alice", r#"{"a":1}"#).unwrap();
        users.update("alice", r#"{"a":2}"#).unwrap();
        assert_eq!(users.get("alice").unwrap(), br#"{"a":2}"#);

        let result = users.update("alice", "not json");
        assert!(matches!(result, Err(FolderDbError::InvalidContent(_))));
        assert_eq!(users.get("alice").unwrap(), br#"{"a":2}"#);
    }

    #[test]
    fn test_delete_then_get_is_not_found() {
        let (_tmp, store) = setup_test_store();
        let users = store.collection("users").unwrap();

        users.create("alice", r#"{"a":1}"#).unwrap();
        users.delete("alice").unwrap();

        assert!(matches!(users.get("alice"), Err(FolderDbError::NotFound { .. })));
        assert!(matches!(users.delete("alice"), Err(FolderDbError::NotFound { .. })));
    }

    #[test]
    fn test_list_missing_collection_is_empty() {
        let (_tmp, store) = setup_test_store();
        let docs = store.collection("nothing-here").unwrap().list().unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_corrupt_files_are_skipped() {
        let (tmp, store) = setup_test_store();
        let users = store.collection("users").unwrap();
        users.create("alice", r#"{"name":"Alice"}"#).unwrap();
        std::fs::write(tmp.path().join("users/broken.json"), "{\"name\": ").unwrap();
        std::fs::write(tmp.path().join("users/notes.txt"), "ignored").unwrap();

        let report = users.list_report().unwrap();
        assert_eq!(report.documents, vec![json!({"name": "Alice"})]);
        assert_eq!(report.skipped, 1);

        let found = users.search("name", "alice").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_insert_generates_and_stamps_id() {
        let (_tmp, store) = setup_test_store();
        let posts = store.collection("posts").unwrap();

        let id = posts.insert(r#"{"title":"Hello"}"#).unwrap();
        assert!(!id.is_empty());

        let stored: Value = serde_json::from_slice(&posts.get(&id).unwrap()).unwrap();
        assert_eq!(stored, json!({"title": "Hello", "id": id}));
    }

    #[test]
    fn test_traversal_is_rejected_before_io() {
        let (tmp, store) = setup_test_store();
        std::fs::write(tmp.path().join("secret.json"), "{}").unwrap();

        assert!(matches!(store.collection(".."), Err(FolderDbError::InvalidPath)));
        assert!(matches!(store.collection("/etc"), Err(FolderDbError::InvalidPath)));

        let users = store.collection("users").unwrap();
        assert!(matches!(users.get("../secret"), Err(FolderDbError::InvalidPath)));
        assert!(matches!(
            users.create("../../escape", "{}"),
            Err(FolderDbError::InvalidPath)
        ));
        assert!(matches!(users.delete(".."), Err(FolderDbError::InvalidPath)));
        assert!(tmp.path().join("secret.json").exists());
    }

    #[test]
    fn test_blank_parameters() {
        let (_tmp, store) = setup_test_store();
        assert!(matches!(
            store.collection("  "),
            Err(FolderDbError::MissingParameter("collection"))
        ));
        let users = store.collection("users").unwrap();
        assert!(matches!(users.get(""), Err(FolderDbError::MissingParameter("id"))));
        assert!(matches!(
            users.search("name", " "),
            Err(FolderDbError::MissingParameter("value"))
        ));
    }

    #[test]
    fn test_complex_search() {
        let (_tmp, store) = setup_test_store();
        let people = store.collection("people").unwrap();
        people.create("a", r#"{"active":"true","name":"Juana"}"#).unwrap();
        people.create("b", r#"{"active":"false","name":"Juana"}"#).unwrap();
        people.create("c", r#"{"active":"true","name":"Pedro"}"#).unwrap();

        let filters = vec![
            Filter::new("active", Operator::Equals, "true"),
            Filter::new("name", Operator::Contains, "ana"),
        ];
        let found = people.complex_search(&filters).unwrap();
        assert_eq!(found, vec![json!({"active":"true","name":"Juana"})]);

        assert!(matches!(
            people.complex_search(&[]),
            Err(FolderDbError::EmptyFilterSet)
        ));
    }

    #[test]
    fn test_search_matches_typed_values() {
        let (_tmp, store) = setup_test_store();
        let people = store.collection("people").unwrap();
        people.create("a", r#"{"age": 20, "vip": true}"#).unwrap();
        people.create("b", r#"{"age": 31, "vip": false}"#).unwrap();

        assert_eq!(people.search("age", "20").unwrap().len(), 1);
        assert_eq!(people.search("vip", "TRUE").unwrap().len(), 1);
        assert!(people.search("Age", "20").unwrap().is_empty());

        let older = people
            .complex_search(&[Filter::new("age", Operator::GreaterThan, "18")])
            .unwrap();
        assert_eq!(older.len(), 2);
    }

    #[test]
    fn test_memory_backend_behaves_like_disk() {
        let store = memory_store();
        let users = store.collection("users").unwrap();

        assert!(users.list().unwrap().is_empty());
        users.create("alice", r#"{"name":"Alice"}"#).unwrap();
        assert_eq!(users.get("alice").unwrap(), br#"{"name":"Alice"}"#);
        assert!(matches!(users.update("bob", "{}"), Err(FolderDbError::NotFound { .. })));
        assert!(matches!(users.get(".."), Err(FolderDbError::InvalidPath)));
        assert!(matches!(store.collection("a/b"), Err(FolderDbError::InvalidPath)));

        users.delete("alice").unwrap();
        assert!(users.list().unwrap().is_empty());
    }

    #[test]
    fn test_numbers_keep_their_text() {
        let (_tmp, store) = setup_test_store();
        let items = store.collection("items").unwrap();
        items
            .create("a", r#"{"price": 10.50, "sci": 1e2, "big": 12345678901234567890123}"#)
            .unwrap();

        assert_eq!(items.search("price", "10.50").unwrap().len(), 1);
        assert_eq!(items.search("sci", "1e2").unwrap().len(), 1);
        assert_eq!(items.search("big", "12345678901234567890123").unwrap().len(), 1);
        assert!(items.search("price", "10.5").unwrap().is_empty());

        let listed = serde_json::to_string(&items.list().unwrap()).unwrap();
        assert_eq!(
            listed,
            r#"[{"price":10.50,"sci":1e2,"big":12345678901234567890123}]"#
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_documents_and_assets_follow_umask() {
        use std::os::unix::fs::PermissionsExt;

        let (tmp, store) = setup_test_store();
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        let reference = tmp.path().join("reference");
        std::fs::write(&reference, b"x").unwrap();

        store.collection("docs").unwrap().create("a", "{}").unwrap();
        store.assets().store(Some("p"), b"x", "p.png").unwrap();

        assert_eq!(mode(&tmp.path().join("docs/a.json")), mode(&reference));
        assert_eq!(mode(&tmp.path().join("resources/p.png")), mode(&reference));
    }

    #[test]
    fn test_invalid_images_folder_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = StorageConfig {
            base_directory: tmp.path().to_path_buf(),
            images_folder: "../outside".into(),
            ..StorageConfig::default()
        };
        assert!(matches!(Store::open(config), Err(FolderDbError::Config(_))));
    }
}
