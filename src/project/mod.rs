//! Project sources, dependencies and import graph
//!
//! A [`Project`] is loaded once per command. The file tree is walked and the
//! import graph is built eagerly; builds only ever read from it.

pub mod graph;

use crate::core::{BuildError, FileItem, ProjectConfig};
use crate::pipeline::FileStream;
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

pub use graph::{DependencyGraph, ImportGraph, Reference};

/// Directory under the project root that receives build output
pub const BUILD_DIR_NAME: &str = "build";

/// Supplies the two input streams of a build and the graph behind them
pub trait SourceProvider: Send + Sync {
    fn root(&self) -> &Path;

    /// Directory holding third-party components, relative to the root
    fn components_dir(&self) -> &Path;

    /// First-party files, with streamed payloads
    fn sources(&self) -> FileStream;

    /// Third-party files reachable from the sources, buffered
    fn dependencies(&self) -> FileStream;

    fn graph(&self) -> Arc<dyn DependencyGraph>;
}

/// A project on disk
pub struct Project {
    root: PathBuf,
    components_dir: PathBuf,
    sources: Vec<PathBuf>,
    dependencies: Vec<PathBuf>,
    graph: Arc<ImportGraph>,
}

impl Project {
    /// Walk the project tree and build its import graph
    pub async fn load(config: &ProjectConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let root = config.root();
        if !root.is_dir() {
            return Err(BuildError::Config(format!(
                "Project root {} is not a directory",
                root.display()
            )));
        }

        let components_dir = config.components_dir.clone();
        let walk_root = root.clone();
        let files = tokio::task::spawn_blocking(move || walk(&walk_root))
            .await
            .map_err(|e| BuildError::Task(e.to_string()))??;
        debug!("Found {} files under {}", files.len(), root.display());

        let source_patterns = patterns(&config.sources)?;
        let extra_patterns = patterns(&config.extra_dependencies)?;
        let entry_documents = config.entry_documents();

        let mut sources = BTreeSet::new();
        for file in &files {
            if file.starts_with(&components_dir) {
                continue;
            }
            if entry_documents.contains(file) || source_patterns.iter().any(|p| p.matches_path(file)) {
                sources.insert(file.clone());
            }
        }
        for document in &entry_documents {
            if !sources.contains(document) {
                return Err(BuildError::Config(format!(
                    "Entry document {} does not exist",
                    document.display()
                )));
            }
        }

        let graph = ImportGraph::scan(
            &root,
            &files,
            config.entrypoint.clone(),
            config.shell.clone(),
            config.fragments.clone(),
        )
        .await?;

        let mut dependencies = BTreeSet::new();
        for source in &sources {
            for dep in graph.transitive_dependencies(source) {
                if dep.starts_with(&components_dir) {
                    dependencies.insert(dep);
                }
            }
        }
        for file in &files {
            if !sources.contains(file) && extra_patterns.iter().any(|p| p.matches_path(file)) {
                dependencies.insert(file.clone());
            }
        }

        debug!(
            "{} sources, {} dependencies",
            sources.len(),
            dependencies.len()
        );

        Ok(Self {
            root,
            components_dir,
            sources: sources.into_iter().collect(),
            dependencies: dependencies.into_iter().collect(),
            graph: Arc::new(graph),
        })
    }

    pub fn source_paths(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn dependency_paths(&self) -> &[PathBuf] {
        &self.dependencies
    }
}

impl SourceProvider for Project {
    fn root(&self) -> &Path {
        &self.root
    }

    fn components_dir(&self) -> &Path {
        &self.components_dir
    }

    fn sources(&self) -> FileStream {
        let root = self.root.clone();
        let paths = self.sources.clone();
        FileStream::spawn("sources", |out| async move {
            for path in paths {
                let full = root.join(&path);
                let file = tokio::fs::File::open(&full)
                    .await
                    .map_err(|e| BuildError::io(&full, e))?;
                out.emit(FileItem::streamed(root.clone(), path, file))
                    .await?;
            }
            Ok(())
        })
    }

    fn dependencies(&self) -> FileStream {
        let root = self.root.clone();
        let paths = self.dependencies.clone();
        FileStream::spawn("dependencies", |out| async move {
            for path in paths {
                let full = root.join(&path);
                let bytes = tokio::fs::read(&full)
                    .await
                    .map_err(|e| BuildError::io(&full, e))?;
                out.emit(FileItem::buffered(root.clone(), path, bytes))
                    .await?;
            }
            Ok(())
        })
    }

    fn graph(&self) -> Arc<dyn DependencyGraph> {
        self.graph.clone()
    }
}

fn patterns(globs: &[String]) -> Result<Vec<Pattern>, BuildError> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|e| BuildError::Config(format!("Invalid glob '{}': {}", g, e)))
        })
        .collect()
}

/// Every file under `root` as a sorted root-relative path, without the build
/// directory and hidden entries
fn walk(root: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let build_dir = root.join(BUILD_DIR_NAME);
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
            !hidden && entry.path() != build_dir
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            BuildError::io(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }
    Ok(files)
}
