//! Transit API-key management.
//!
//! [`KeyConfig`] says where the key lives and how it is sent upstream.
//! [`KeyStore`] is the async trait for resolving a reference into its plaintext value.
//! [`EnvKeyStore`] reads environment variables; [`FileKeyStore`] reads key files.

mod config;
mod env;
mod file;

pub use config::{KeyConfig, KeyPlacement, KeySource};
pub use env::EnvKeyStore;
pub use file::FileKeyStore;

use anyhow::Result;

/// Resolves a reference (an env var name, a file path) into a plaintext secret.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<String>;
}
