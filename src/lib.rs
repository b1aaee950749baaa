pub mod backend;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod git;
pub mod manager;
pub mod namespace;
pub mod process;
pub mod vault;

pub use errors::{LockboxError, Result};
pub use manager::{ManagerState, SecretsManager, StoreConfig, UnlockReport};
pub use namespace::Namespace;
