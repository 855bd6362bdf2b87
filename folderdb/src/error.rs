use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolderDbError {
    #[error("Invalid path")]
    InvalidPath,

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("At least one search filter is required")]
    EmptyFilterSet,

    #[error("Extension not allowed: {0}")]
    InvalidExtension(String),

    #[error("Could not determine the file extension")]
    MissingExtension,

    #[error("The uploaded file is empty")]
    EmptyFile,

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl FolderDbError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        FolderDbError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// True for errors caused by the caller's input rather than by the store itself.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            FolderDbError::Io(_)
                | FolderDbError::Json(_)
                | FolderDbError::Yaml(_)
                | FolderDbError::Config(_)
                | FolderDbError::Other(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FolderDbError>;
