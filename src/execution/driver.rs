//! Multi-build driver - decides which builds run and schedules them

use crate::core::{BuildConfig, BuildError, BuildState};
use crate::execution::BuildEngine;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something that can run one build variant
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, config: &BuildConfig) -> Result<BuildState, BuildError>;
}

#[async_trait]
impl Builder for BuildEngine {
    async fn build(&self, config: &BuildConfig) -> Result<BuildState, BuildError> {
        BuildEngine::build(self, config).await
    }
}

/// Strategy for scheduling build variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One build at a time, in configuration order
    Sequential,

    /// Every build started at once
    #[default]
    Parallel,
}

/// Builds to run for one invocation.
///
/// A build described on the command line always wins. Otherwise the
/// configured builds run, and with none configured a single default build.
pub fn resolve_builds(cli: Option<BuildConfig>, configured: Option<&[BuildConfig]>) -> Vec<BuildConfig> {
    if let Some(build) = cli {
        return vec![build];
    }
    match configured {
        Some(builds) if !builds.is_empty() => builds.to_vec(),
        _ => vec![BuildConfig::default()],
    }
}

/// Runs a batch of builds that share one output root
pub struct BuildDriver {
    builder: Arc<dyn Builder>,
    build_root: PathBuf,
    strategy: SchedulingStrategy,
}

impl BuildDriver {
    pub fn new(builder: Arc<dyn Builder>, build_root: impl Into<PathBuf>) -> Self {
        Self {
            builder,
            build_root: build_root.into(),
            strategy: SchedulingStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Clear the output root once, then run every build.
    ///
    /// A failing build does not stop the others; the first error in
    /// configuration order is returned after all of them have settled.
    pub async fn run(&self, builds: Vec<BuildConfig>) -> Result<Vec<BuildState>, BuildError> {
        clear_build_root(&self.build_root).await?;

        let results = if builds.len() == 1 {
            vec![self.builder.build(&builds[0]).await]
        } else {
            match self.strategy {
                SchedulingStrategy::Sequential => self.run_sequential(&builds).await,
                SchedulingStrategy::Parallel => self.run_parallel(builds).await,
            }
        };

        let mut states = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(state) => states.push(state),
                Err(e) => {
                    if first_error.is_some() {
                        warn!("Additional build failure: {}", e);
                    } else {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("{} build(s) complete", states.len());
                Ok(states)
            }
        }
    }

    async fn run_sequential(&self, builds: &[BuildConfig]) -> Vec<Result<BuildState, BuildError>> {
        let mut results = Vec::with_capacity(builds.len());
        for build in builds {
            results.push(self.builder.build(build).await);
        }
        results
    }

    async fn run_parallel(&self, builds: Vec<BuildConfig>) -> Vec<Result<BuildState, BuildError>> {
        let handles: Vec<_> = builds
            .into_iter()
            .map(|build| {
                let builder = self.builder.clone();
                tokio::spawn(async move { builder.build(&build).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(
                handle
                    .await
                    .map_err(|e| BuildError::Task(e.to_string()))
                    .and_then(|r| r),
            );
        }
        results
    }
}

/// Remove the whole output root; a missing root is fine
pub async fn clear_build_root(build_root: &Path) -> Result<(), BuildError> {
    debug!("Clearing {}", build_root.display());
    match tokio::fs::remove_dir_all(build_root).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(build_root, e)),
    }
}
