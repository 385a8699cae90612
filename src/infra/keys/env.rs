use anyhow::{Context, Result};

use super::KeyStore;

/// Resolves secrets from process environment variables (including any
/// loaded from `.env` by `dotenvy`).
pub struct EnvKeyStore;

#[async_trait::async_trait]
impl KeyStore for EnvKeyStore {
    /// Returns the value of the variable named `reference`.
    async fn get(&self, reference: &str) -> Result<String> {
        let value = std::env::var(reference)
            .with_context(|| format!("environment variable '{reference}' is not set"))?;
        let value = value.trim();
        if value.is_empty() {
            anyhow::bail!("environment variable '{reference}' is empty");
        }
        Ok(value.to_string())
    }
}
