use folderdb::Store;

pub mod handlers;

/// Environment variable for the bind address.
pub const HOST_ENV: &str = "FOLDERDB_HOST";
/// Environment variable for the bind port.
pub const PORT_ENV: &str = "FOLDERDB_PORT";

/// Request bodies (JSON documents, multipart uploads) larger than this are rejected.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub store: Store,
}

/// Where the HTTP server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unparsable ports fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: lookup(HOST_ENV)
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.host),
            port: lookup(PORT_ENV)
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}
