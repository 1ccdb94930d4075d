//! Service worker generation for finished builds

pub mod config;
pub mod generator;

use crate::core::BuildError;
use crate::project::DependencyGraph;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub use config::{FsSwConfigLoader, SwConfig, SwConfigLoader, DEFAULT_SW_CONFIG};
pub use generator::{PrecacheGenerator, SERVICE_WORKER_FILE};

/// Everything a generator needs to know about one written build
#[derive(Clone)]
pub struct ServiceWorkerRequest {
    /// The build's committed output directory
    pub build_root: PathBuf,

    pub graph: Arc<dyn DependencyGraph>,

    /// `None` means defaults
    pub sw_config: Option<SwConfig>,

    pub bundled: bool,
}

#[async_trait]
pub trait ServiceWorkerGenerator: Send + Sync {
    async fn generate(&self, request: ServiceWorkerRequest) -> Result<(), BuildError>;
}
