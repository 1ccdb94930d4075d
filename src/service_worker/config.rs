//! Service worker configuration loading

use crate::core::BuildError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default config file name, relative to the project root
pub const DEFAULT_SW_CONFIG: &str = "sw-precache-config.json";

/// Precache options; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwConfig {
    /// Prefix of the cache name
    pub cache_id: Option<String>,

    /// Globs, relative to the build directory, selecting precached files
    pub static_file_globs: Option<Vec<String>>,

    /// URL served for navigations that miss the cache
    pub navigate_fallback: Option<String>,

    pub skip_waiting: Option<bool>,

    pub clients_claim: Option<bool>,

    /// Larger files are left out of the manifest
    pub maximum_file_size_to_cache_in_bytes: Option<u64>,
}

/// Loads a service worker config. An absent file is `Ok(None)`.
#[async_trait]
pub trait SwConfigLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Option<SwConfig>, BuildError>;
}

/// Reads JSON (by extension) or YAML config files from disk
#[derive(Debug, Default, Clone)]
pub struct FsSwConfigLoader;

#[async_trait]
impl SwConfigLoader for FsSwConfigLoader {
    async fn load(&self, path: &Path) -> Result<Option<SwConfig>, BuildError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No service worker config at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(BuildError::io(path, e)),
        };

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed: Result<SwConfig, String> = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };
        let config = parsed.map_err(|e| {
            BuildError::Config(format!("Invalid service worker config {}: {}", path.display(), e))
        })?;

        Ok(Some(config))
    }
}
