use anyhow::{Context, Result};
use serde::Deserialize;

use super::{EnvKeyStore, FileKeyStore, KeyStore};

/// Query parameter used when the config does not say otherwise.
pub const DEFAULT_KEY_PARAM: &str = "api_key";

/// Where the API key is kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Name of an environment variable.
    Env(String),
    /// Path of a key file.
    File(String),
}

/// How the API key travels with each request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPlacement {
    None,
    UrlParam(String),
    Header(String),
}

impl Default for KeyPlacement {
    fn default() -> Self {
        KeyPlacement::UrlParam(DEFAULT_KEY_PARAM.to_string())
    }
}

/// API-key configuration, stored as JSON on disk:
/// ```json
/// {
///   "source": { "file": "/home/me/.config/bus_arrivals/api_key" },
///   "auth": { "header": "X-Api-Key" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyConfig {
    pub source: KeySource,
    #[serde(default)]
    pub auth: KeyPlacement,
}

impl KeyConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading key config '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("parsing key config '{path}'"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Resolves the configured source into the plaintext key.
    pub async fn resolve(&self) -> Result<String> {
        match &self.source {
            KeySource::Env(name) => EnvKeyStore.get(name).await,
            KeySource::File(path) => FileKeyStore.get(path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_config() {
        let cfg = KeyConfig::from_json(
            r#"{ "source": { "env": "TRANSIT_KEY" }, "auth": { "header": "X-Api-Key" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.source, KeySource::Env("TRANSIT_KEY".to_string()));
        assert_eq!(cfg.auth, KeyPlacement::Header("X-Api-Key".to_string()));
    }

    #[test]
    fn test_auth_defaults_to_query_param() {
        let cfg = KeyConfig::from_json(r#"{ "source": { "file": "/tmp/key" } }"#).unwrap();
        assert_eq!(cfg.auth, KeyPlacement::UrlParam(DEFAULT_KEY_PARAM.to_string()));
    }

    #[test]
    fn test_auth_none() {
        let cfg =
            KeyConfig::from_json(r#"{ "source": { "env": "X" }, "auth": "none" }"#).unwrap();
        assert_eq!(cfg.auth, KeyPlacement::None);
    }

    #[test]
    fn test_rejects_unknown_source() {
        assert!(KeyConfig::from_json(r#"{ "source": { "vault": "x" } }"#).is_err());
    }

    #[tokio::test]
    async fn test_resolve_from_file() {
        let path = std::env::temp_dir().join("bus_arrivals_test_config_key");
        std::fs::write(&path, "k-123\n").unwrap();
        let cfg = KeyConfig {
            source: KeySource::File(path.to_string_lossy().into_owned()),
            auth: KeyPlacement::default(),
        };
        assert_eq!(cfg.resolve().await.unwrap(), "k-123");
        std::fs::remove_file(&path).unwrap();
    }
}
