//! Import graph between project documents

use crate::core::{BuildError, ContentKind};
use crate::html::{resolve_reference, scan_tags};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Read-only queries over the project's dependency graph
pub trait DependencyGraph: Send + Sync {
    fn entrypoint(&self) -> &Path;

    fn shell(&self) -> Option<&Path>;

    fn fragments(&self) -> &[PathBuf];

    /// Existing files `path` references itself, in document order
    fn direct_dependencies(&self, path: &Path) -> Vec<PathBuf>;

    /// Every existing file reachable from `path`, breadth first, without
    /// `path` itself
    fn transitive_dependencies(&self, path: &Path) -> Vec<PathBuf>;

    /// Local references found in `path`, including unresolved ones
    fn references(&self, path: &Path) -> Vec<Reference>;
}

/// A local reference from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Attribute value as written
    pub href: String,

    /// Project-relative target; `None` when it escapes the root
    pub target: Option<PathBuf>,

    /// Whether the target is a file of the project
    pub exists: bool,
}

/// Graph built from `<link rel=import|stylesheet>` and `<script src>`
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    entrypoint: PathBuf,
    shell: Option<PathBuf>,
    fragments: Vec<PathBuf>,
    references: HashMap<PathBuf, Vec<Reference>>,
}

impl ImportGraph {
    pub fn from_references(
        entrypoint: PathBuf,
        shell: Option<PathBuf>,
        fragments: Vec<PathBuf>,
        references: HashMap<PathBuf, Vec<Reference>>,
    ) -> Self {
        Self {
            entrypoint,
            shell,
            fragments,
            references,
        }
    }

    /// Scan the markup documents among `files`.
    ///
    /// `files` are paths relative to `root`; they also decide which
    /// references exist.
    pub async fn scan(
        root: &Path,
        files: &[PathBuf],
        entrypoint: PathBuf,
        shell: Option<PathBuf>,
        fragments: Vec<PathBuf>,
    ) -> Result<Self, BuildError> {
        let known: HashSet<&Path> = files.iter().map(PathBuf::as_path).collect();
        let mut references = HashMap::new();

        for document in files {
            if ContentKind::from_path(document) != ContentKind::Markup {
                continue;
            }
            let full = root.join(document);
            let source = tokio::fs::read_to_string(&full)
                .await
                .map_err(|e| BuildError::io(&full, e))?;
            let refs = document_references(document, &source, &known)?;
            if !refs.is_empty() {
                references.insert(document.clone(), refs);
            }
        }

        Ok(Self::from_references(entrypoint, shell, fragments, references))
    }
}

fn document_references(
    document: &Path,
    source: &str,
    known: &HashSet<&Path>,
) -> Result<Vec<Reference>, BuildError> {
    let tags = scan_tags(document, source, &["link", "script"])?;
    let mut refs = Vec::new();
    for tag in tags {
        let href = match tag.name.as_str() {
            "script" => tag.attr("src"),
            _ if tag.has_rel("import") || tag.has_rel("stylesheet") => tag.attr("href"),
            _ => None,
        };
        let Some(href) = href else {
            continue;
        };

        let href = href.trim();
        let local = !(href.is_empty()
            || href.starts_with('#')
            || href.starts_with("//")
            || url::Url::parse(href).is_ok());
        if !local {
            continue;
        }

        let target = resolve_reference(document, href);
        let exists = target.as_deref().is_some_and(|t| known.contains(t));
        refs.push(Reference {
            href: href.to_string(),
            target,
            exists,
        });
    }
    Ok(refs)
}

impl DependencyGraph for ImportGraph {
    fn entrypoint(&self) -> &Path {
        &self.entrypoint
    }

    fn shell(&self) -> Option<&Path> {
        self.shell.as_deref()
    }

    fn fragments(&self) -> &[PathBuf] {
        &self.fragments
    }

    fn direct_dependencies(&self, path: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.references
            .get(path)
            .into_iter()
            .flatten()
            .filter(|r| r.exists)
            .filter_map(|r| r.target.clone())
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    fn transitive_dependencies(&self, path: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::from([path.to_path_buf()]);
        let mut queue = VecDeque::from([path.to_path_buf()]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            for dep in self.direct_dependencies(&current) {
                if seen.insert(dep.clone()) {
                    out.push(dep.clone());
                    queue.push_back(dep);
                }
            }
        }
        out
    }

    fn references(&self, path: &Path) -> Vec<Reference> {
        self.references.get(path).cloned().unwrap_or_default()
    }
}
