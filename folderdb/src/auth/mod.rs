//! Registration and login backed by the reserved `user` collection.
//!
//! Credential documents are plain JSON files, `{"id", "name", "passwd", "email"}`,
//! found by scanning the collection the same way search does. `passwd` holds an
//! Argon2 PHC string; values that are not PHC strings are compared literally so
//! that hand-written user files keep working.

use crate::error::{FolderDbError, Result};
use crate::store::{Collection, Store};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection holding credential documents.
pub const USER_COLLECTION: &str = "user";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub passwd: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub passwd: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub message: String,
}

/// Stored shape of a user document.
#[derive(Debug, Serialize)]
struct UserRecord<'r> {
    id: &'r str,
    name: &'r str,
    passwd: &'r str,
    email: Option<&'r str>,
}

#[derive(Debug)]
pub struct Credentials<'a> {
    store: &'a Store,
}

impl<'a> Credentials<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Credentials { store }
    }

    fn users(&self) -> Result<Collection<'a>> {
        self.store.collection(USER_COLLECTION)
    }

    /// First user document whose `name` matches, ignoring case.
    fn find_by_name(&self, name: &str) -> Result<Option<serde_json::Map<String, Value>>> {
        let wanted = name.to_lowercase();
        let report = self.users()?.scan(|user| {
            user.get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.to_lowercase() == wanted)
        })?;

        Ok(report.documents.into_iter().find_map(|doc| match doc {
            Value::Object(map) => Some(map),
            _ => None,
        }))
    }

    /// Create a new user. Names are unique ignoring case.
    pub fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        require_name_and_password(&request.name, &request.passwd)?;

        if self.find_by_name(&request.name)?.is_some() {
            return Err(FolderDbError::UserExists(request.name.clone()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let hash = hash_password(&request.passwd)?;
        let email = request.email.as_deref().filter(|e| !e.trim().is_empty());
        let record = UserRecord {
            id: &id,
            name: &request.name,
            passwd: &hash,
            email,
        };

        self.users()?.create(&id, &serde_json::to_string(&record)?)?;
        log::info!("Registered user {}", request.name);

        Ok(AuthResponse {
            id,
            name: request.name.clone(),
            email: email.map(str::to_string),
            message: "User registered".to_string(),
        })
    }

    /// Check a name/password pair against the stored users.
    pub fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        require_name_and_password(&request.name, &request.passwd)?;

        let user = self
            .find_by_name(&request.name)?
            .ok_or(FolderDbError::InvalidCredentials)?;

        let stored = user
            .get("passwd")
            .and_then(Value::as_str)
            .ok_or(FolderDbError::InvalidCredentials)?;
        if !verify_password(&request.passwd, stored) {
            log::debug!("Rejected login for {}", request.name);
            return Err(FolderDbError::InvalidCredentials);
        }

        let text = |key: &str| user.get(key).and_then(Value::as_str).map(str::to_string);
        Ok(AuthResponse {
            id: text("id").unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            email: text("email"),
            message: "Login successful".to_string(),
        })
    }
}

fn require_name_and_password(name: &str, passwd: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FolderDbError::MissingParameter("name"));
    }
    if passwd.trim().is_empty() {
        return Err(FolderDbError::MissingParameter("passwd"));
    }
    Ok(())
}

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| FolderDbError::Other(format!("password hashing failed: {e}")))
}

/// Verify against a PHC string, or literally when `stored` is not one.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => password == stored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let store = Store::open_path(tmp.path()).unwrap();
        (tmp, store)
    }

    fn register(store: &Store, name: &str, passwd: &str) -> Result<AuthResponse> {
        store.credentials().register(&RegisterRequest {
            name: name.into(),
            passwd: passwd.into(),
            email: Some(format!("{name}@example.com")),
        })
    }

    #[test]
    fn test_register_then_login() {
        let (_tmp, store) = setup();
        let registered = register(&store, "Ana", "s3cret").unwrap();

        let response = store
            .credentials()
            .login(&LoginRequest {
                name: "ana".into(),
                passwd: "s3cret".into(),
            })
            .unwrap();

        assert_eq!(response.id, registered.id);
        assert_eq!(response.name, "Ana");
        assert_eq!(response.email.as_deref(), Some("Ana@example.com"));
    }

    #[test]
    fn test_password_is_not_stored_in_clear() {
        let (_tmp, store) = setup();
        let registered = register(&store, "Ana", "s3cret").unwrap();

        let raw = store.collection(USER_COLLECTION).unwrap().get(&registered.id).unwrap();
        let doc: Value = serde_json::from_slice(&raw).unwrap();
        let passwd = doc["passwd"].as_str().unwrap();
        assert_ne!(passwd, "s3cret");
        assert!(passwd.starts_with("$argon2"));
        assert_eq!(doc["id"], registered.id.as_str());
    }

    #[test]
    fn test_wrong_password_and_unknown_user() {
        let (_tmp, store) = setup();
        register(&store, "Ana", "s3cret").unwrap();
        let creds = store.credentials();

        let wrong = creds.login(&LoginRequest {
            name: "Ana".into(),
            passwd: "guess".into(),
        });
        assert!(matches!(wrong, Err(FolderDbError::InvalidCredentials)));

        let unknown = creds.login(&LoginRequest {
            name: "Luis".into(),
            passwd: "s3cret".into(),
        });
        assert!(matches!(unknown, Err(FolderDbError::InvalidCredentials)));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let (_tmp, store) = setup();
        register(&store, "Ana", "one").unwrap();
        assert!(matches!(
            register(&store, "ANA", "two"),
            Err(FolderDbError::UserExists(_))
        ));
    }

    #[test]
    fn test_missing_fields() {
        let (_tmp, store) = setup();
        assert!(matches!(
            register(&store, " ", "pw"),
            Err(FolderDbError::MissingParameter("name"))
        ));
        assert!(matches!(
            store.credentials().login(&LoginRequest::default()),
            Err(FolderDbError::MissingParameter("name"))
        ));
    }

    #[test]
    fn test_plain_text_legacy_user_and_corrupt_files() {
        let (tmp, store) = setup();
        let dir = tmp.path().join(USER_COLLECTION);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.json"), "{\"name\":").unwrap();
        std::fs::write(
            dir.join("u1.json"),
            r#"{"id":"u1","name":"legacy","passwd":"plain","email":null}"#,
        )
        .unwrap();

        let response = store
            .credentials()
            .login(&LoginRequest {
                name: "Legacy".into(),
                passwd: "plain".into(),
            })
            .unwrap();
        assert_eq!(response.id, "u1");
        assert_eq!(response.email, None);
    }
}
