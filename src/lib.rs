//! assetline - A build pipeline for static web-asset projects

pub mod cli;
pub mod core;
pub mod execution;
pub mod html;
pub mod lint;
pub mod pipeline;
pub mod project;
pub mod service_worker;

// Re-export commonly used types
pub use core::{BuildConfig, BuildError, BuildPhase, BuildState, FileItem, ProjectConfig};
pub use execution::{BuildDriver, BuildEngine, BuildEvent, SchedulingStrategy};
pub use pipeline::{FileStream, Stage};
pub use project::{DependencyGraph, Project, SourceProvider};
