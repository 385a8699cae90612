use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::KeyStore;

/// Resolves secrets from key files holding a single line.
pub struct FileKeyStore;

impl FileKeyStore {
    /// Writes `key` to `path`, creating parent directories. On Unix the file
    /// is readable by its owner only.
    pub fn store(path: &Path, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("refusing to store an empty API key");
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(path, format!("{key}\n"))
            .with_context(|| format!("writing key file {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(path = %path.display(), "API key stored");
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyStore for FileKeyStore {
    /// Reads the file at `reference` and returns its trimmed contents.
    async fn get(&self, reference: &str) -> Result<String> {
        let content = tokio::fs::read_to_string(reference)
            .await
            .with_context(|| format!("reading key file '{reference}'"))?;
        let key = content.trim();
        if key.is_empty() {
            anyhow::bail!("key file '{reference}' is empty");
        }
        Ok(key.to_string())
    }
}
