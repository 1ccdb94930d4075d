//! Precache service worker generation
//!
//! Reads the committed build directory, so it must only run after the write
//! phase of the same build has completed.

use crate::core::{BuildError, ContentKind};
use crate::project::DependencyGraph;
use crate::service_worker::{ServiceWorkerGenerator, ServiceWorkerRequest, SwConfig};
use async_trait::async_trait;
use glob::Pattern;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};
use walkdir::WalkDir;

/// File written into the build directory
pub const SERVICE_WORKER_FILE: &str = "service-worker.js";

const DEFAULT_CACHE_ID: &str = "assetline";

/// 2 MiB, files above are not precached unless configured otherwise
const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

const TEMPLATE: &str = r#"/* Generated by assetline. Changes will be overwritten on the next build. */
'use strict';

var precacheConfig = __PRECACHE__;
var cacheName = __CACHE_NAME__;
var cachePrefix = __CACHE_PREFIX__;
var navigateFallback = __NAVIGATE_FALLBACK__;
var skipWaiting = __SKIP_WAITING__;
var clientsClaim = __CLIENTS_CLAIM__;

function absoluteUrl(path) {
  return new URL(path, self.registration.scope).toString();
}

var precachedUrls = precacheConfig.map(function(entry) {
  return absoluteUrl(entry[0]);
});

self.addEventListener('install', function(event) {
  event.waitUntil(
    caches.open(cacheName).then(function(cache) {
      return Promise.all(precacheConfig.map(function(entry) {
        var request = new Request(entry[0] + '?__rev=' + entry[1], {credentials: 'same-origin'});
        return fetch(request).then(function(response) {
          if (!response.ok) {
            throw new Error('Request for ' + entry[0] + ' returned ' + response.status);
          }
          return cache.put(absoluteUrl(entry[0]), response);
        });
      }));
    }).then(function() {
      if (skipWaiting) {
        return self.skipWaiting();
      }
    })
  );
});

self.addEventListener('activate', function(event) {
  event.waitUntil(
    caches.keys().then(function(names) {
      return Promise.all(names.filter(function(name) {
        return name.indexOf(cachePrefix) === 0 && name !== cacheName;
      }).map(function(name) {
        return caches.delete(name);
      }));
    }).then(function() {
      if (clientsClaim) {
        return self.clients.claim();
      }
    })
  );
});

self.addEventListener('fetch', function(event) {
  if (event.request.method !== 'GET') {
    return;
  }
  var url = new URL(event.request.url);
  url.search = '';
  url.hash = '';
  var key = url.toString();
  if (precachedUrls.indexOf(key) === -1) {
    if (event.request.mode !== 'navigate' || !navigateFallback) {
      return;
    }
    key = absoluteUrl(navigateFallback);
  }
  event.respondWith(
    caches.open(cacheName).then(function(cache) {
      return cache.match(key);
    }).then(function(response) {
      return response || fetch(event.request);
    })
  );
});
"#;

/// Writes `service-worker.js` with a revisioned precache manifest
#[derive(Debug, Default, Clone)]
pub struct PrecacheGenerator;

/// One manifest entry: URL relative to the build root, and its revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheEntry {
    pub url: String,
    pub revision: String,
}

fn to_url(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `__NAME__` slots in the worker template
fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"__[A-Z_]+__").expect("static regex"))
}

fn hash_content(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

impl PrecacheGenerator {
    /// Files under `build_root` that go into the manifest
    fn select_files(
        build_root: &Path,
        config: &SwConfig,
        graph: &dyn DependencyGraph,
        bundled: bool,
    ) -> Result<Vec<PathBuf>, BuildError> {
        let patterns = match &config.static_file_globs {
            Some(globs) => Some(
                globs
                    .iter()
                    .map(|g| {
                        Pattern::new(g).map_err(|e| {
                            BuildError::ServiceWorker(format!("Invalid glob '{}': {}", g, e))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        let mut entry_documents: HashSet<PathBuf> = graph.fragments().iter().cloned().collect();
        entry_documents.insert(graph.entrypoint().to_path_buf());
        entry_documents.extend(graph.shell().map(Path::to_path_buf));

        let max_size = config
            .maximum_file_size_to_cache_in_bytes
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);

        let mut files = Vec::new();
        for entry in WalkDir::new(build_root).sort_by_file_name() {
            let entry = entry.map_err(|e| BuildError::ServiceWorker(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(build_root) else {
                continue;
            };
            if relative == Path::new(SERVICE_WORKER_FILE) {
                continue;
            }

            let selected = match &patterns {
                Some(patterns) => patterns.iter().any(|p| p.matches_path(relative)),
                None if bundled => {
                    entry_documents.contains(relative)
                        || ContentKind::from_path(relative) != ContentKind::Markup
                }
                None => true,
            };
            if !selected {
                continue;
            }

            let size = entry
                .metadata()
                .map_err(|e| BuildError::ServiceWorker(e.to_string()))?
                .len();
            if size > max_size {
                debug!("Skipping {} ({} bytes) from precache", relative.display(), size);
                continue;
            }
            files.push(relative.to_path_buf());
        }
        Ok(files)
    }

    /// Build the manifest for `request`
    pub async fn manifest(request: &ServiceWorkerRequest) -> Result<Vec<PrecacheEntry>, BuildError> {
        let config = request.sw_config.clone().unwrap_or_default();
        let build_root = request.build_root.clone();
        let graph = request.graph.clone();
        let bundled = request.bundled;
        let files = tokio::task::spawn_blocking(move || {
            Self::select_files(&build_root, &config, graph.as_ref(), bundled)
        })
        .await
        .map_err(|e| BuildError::Task(e.to_string()))??;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let full = request.build_root.join(&file);
            let data = tokio::fs::read(&full)
                .await
                .map_err(|e| BuildError::io(&full, e))?;
            entries.push(PrecacheEntry {
                url: to_url(&file),
                revision: hash_content(&data),
            });
        }
        Ok(entries)
    }

    /// Render the worker script for `entries`
    pub fn render(entries: &[PrecacheEntry], config: &SwConfig, graph: &dyn DependencyGraph) -> String {
        let manifest: Vec<[&str; 2]> = entries
            .iter()
            .map(|e| [e.url.as_str(), e.revision.as_str()])
            .collect();
        let manifest_json = serde_json::json!(manifest).to_string();

        let cache_prefix = format!("{}-", config.cache_id.as_deref().unwrap_or(DEFAULT_CACHE_ID));
        let version = hash_content(manifest_json.as_bytes());
        let cache_name = format!("{}{}", cache_prefix, &version[..8]);

        let fallback = config
            .navigate_fallback
            .clone()
            .unwrap_or_else(|| format!("/{}", to_url(graph.entrypoint())));

        let values: HashMap<&str, String> = HashMap::from([
            ("__PRECACHE__", manifest_json),
            ("__CACHE_NAME__", serde_json::Value::from(cache_name).to_string()),
            ("__CACHE_PREFIX__", serde_json::Value::from(cache_prefix).to_string()),
            ("__NAVIGATE_FALLBACK__", serde_json::Value::from(fallback).to_string()),
            ("__SKIP_WAITING__", config.skip_waiting.unwrap_or(true).to_string()),
            ("__CLIENTS_CLAIM__", config.clients_claim.unwrap_or(false).to_string()),
        ]);

        // One pass, so substituted values are never scanned for placeholders
        placeholder()
            .replace_all(TEMPLATE, |caps: &Captures| {
                values
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

#[async_trait]
impl ServiceWorkerGenerator for PrecacheGenerator {
    async fn generate(&self, request: ServiceWorkerRequest) -> Result<(), BuildError> {
        let entries = Self::manifest(&request).await?;
        let config = request.sw_config.clone().unwrap_or_default();
        let script = Self::render(&entries, &config, request.graph.as_ref());

        let target = request.build_root.join(SERVICE_WORKER_FILE);
        tokio::fs::write(&target, script)
            .await
            .map_err(|e| BuildError::io(&target, e))?;

        info!(
            "Wrote {} with {} precached files",
            target.display(),
            entries.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ImportGraph;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn graph() -> Arc<dyn DependencyGraph> {
        Arc::new(ImportGraph::from_references(
            PathBuf::from("index.html"),
            Some(PathBuf::from("src/app.html")),
            Vec::new(),
            HashMap::new(),
        ))
    }

    fn build_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("index.html"), "<p>index</p>").unwrap();
        std::fs::write(root.join("src/app.html"), "<p>app</p>").unwrap();
        std::fs::write(root.join("src/view.html"), "<p>view</p>").unwrap();
        std::fs::write(root.join("src/app.js"), "run()").unwrap();
        dir
    }

    fn request(root: &Path, sw_config: Option<SwConfig>, bundled: bool) -> ServiceWorkerRequest {
        ServiceWorkerRequest {
            build_root: root.to_path_buf(),
            graph: graph(),
            sw_config,
            bundled,
        }
    }

    fn urls(entries: &[PrecacheEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_default_manifest_has_every_file() {
        let dir = build_dir();
        let entries = PrecacheGenerator::manifest(&request(dir.path(), None, false))
            .await
            .unwrap();

        assert_eq!(
            urls(&entries),
            vec!["index.html", "src/app.html", "src/app.js", "src/view.html"]
        );
        assert_eq!(entries[2].revision, hash_content(b"run()"));
        assert_eq!(entries[2].revision.len(), 64);
    }

    #[tokio::test]
    async fn test_bundled_manifest_skips_inner_documents() {
        let dir = build_dir();
        let entries = PrecacheGenerator::manifest(&request(dir.path(), None, true))
            .await
            .unwrap();
        assert_eq!(urls(&entries), vec!["index.html", "src/app.html", "src/app.js"]);
    }

    #[tokio::test]
    async fn test_static_file_globs_override_defaults() {
        let dir = build_dir();
        let config = SwConfig {
            static_file_globs: Some(vec!["src/*.js".to_string()]),
            ..SwConfig::default()
        };
        let entries = PrecacheGenerator::manifest(&request(dir.path(), Some(config), true))
            .await
            .unwrap();
        assert_eq!(urls(&entries), vec!["src/app.js"]);
    }

    #[tokio::test]
    async fn test_generate_writes_worker_with_defaults() {
        let dir = build_dir();
        PrecacheGenerator
            .generate(request(dir.path(), None, false))
            .await
            .unwrap();

        let script = std::fs::read_to_string(dir.path().join(SERVICE_WORKER_FILE)).unwrap();
        assert!(script.contains(r#"["src/app.js",""#));
        assert!(script.contains(r#"var navigateFallback = "/index.html";"#));
        assert!(script.contains(r#"var cachePrefix = "assetline-";"#));
        assert!(script.contains("var skipWaiting = true;"));
        assert!(!script.contains("__PRECACHE__"));

        // A second run does not precache the worker itself
        let entries = PrecacheGenerator::manifest(&request(dir.path(), None, false))
            .await
            .unwrap();
        assert!(!urls(&entries).contains(&SERVICE_WORKER_FILE));
    }

    #[test]
    fn test_config_values_are_substituted_verbatim() {
        let config = SwConfig {
            navigate_fallback: Some("/__CACHE_NAME__.html".to_string()),
            cache_id: Some("app__PRECACHE__".to_string()),
            ..SwConfig::default()
        };
        let entries = vec![PrecacheEntry {
            url: "index.html".to_string(),
            revision: "abc".to_string(),
        }];
        let script = PrecacheGenerator::render(&entries, &config, graph().as_ref());

        assert!(script.contains(r#"var navigateFallback = "/__CACHE_NAME__.html";"#));
        assert!(script.contains(r#"var cachePrefix = "app__PRECACHE__-";"#));
        assert!(script.contains(r#"var precacheConfig = [["index.html","abc"]];"#));
        assert!(script.contains("'?__rev='"));
    }
}
