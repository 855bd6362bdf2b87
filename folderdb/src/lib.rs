pub mod path;
pub mod document;
pub mod filter;
pub mod backend;
pub mod config;
pub mod store;
pub mod assets;
pub mod auth;
pub mod error;

pub use error::{FolderDbError, Result};
pub use config::{IdStrategy, StorageConfig};
pub use filter::{Filter, Operator};
pub use store::{Collection, Store};
pub use assets::{Asset, AssetStore};
pub use auth::{AuthResponse, Credentials, LoginRequest, RegisterRequest};
