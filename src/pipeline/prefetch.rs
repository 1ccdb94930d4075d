//! Prefetch link insertion for entry documents

use crate::core::{BuildError, ContentKind, FileItem};
use crate::html::relative_href;
use crate::pipeline::{Emitter, Stage};
use crate::project::DependencyGraph;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Adds resource hints for transitive dependencies to the entrypoint, the
/// shell and the fragments.
///
/// Documents that get hints are held until the input ends; only paths that
/// actually passed through the stream are linked. Files the bundler inlined
/// never reach this stage and get no hint.
pub struct PrefetchTransform {
    graph: Arc<dyn DependencyGraph>,
    state: Mutex<Collected>,
}

#[derive(Default)]
struct Collected {
    seen: HashSet<PathBuf>,
    held: Vec<(FileItem, &'static str, Vec<PathBuf>)>,
}

impl PrefetchTransform {
    pub fn new(graph: Arc<dyn DependencyGraph>) -> Self {
        Self {
            graph,
            state: Mutex::new(Collected::default()),
        }
    }

    /// Paths `document` should get a link for, with the link relation
    fn hints_for(&self, document: &Path) -> Option<(&'static str, Vec<PathBuf>)> {
        let graph = &self.graph;
        let direct: HashSet<PathBuf> = graph.direct_dependencies(document).into_iter().collect();

        if document == graph.entrypoint() {
            let mut roots = vec![document.to_path_buf()];
            roots.extend(graph.shell().map(Path::to_path_buf));

            let mut seen = HashSet::new();
            let mut targets = Vec::new();
            for root in &roots {
                for dep in graph.transitive_dependencies(root) {
                    if dep != document && !direct.contains(&dep) && seen.insert(dep.clone()) {
                        targets.push(dep);
                    }
                }
            }
            if let Some(shell) = graph.shell() {
                if !direct.contains(shell) && seen.insert(shell.to_path_buf()) {
                    targets.insert(0, shell.to_path_buf());
                }
            }
            return Some(("prefetch", targets));
        }

        let is_lazy = graph.shell() == Some(document)
            || graph.fragments().iter().any(|f| f == document);
        if !is_lazy {
            return None;
        }

        let targets = graph
            .transitive_dependencies(document)
            .into_iter()
            .filter(|dep| ContentKind::from_path(dep) == ContentKind::Markup)
            .filter(|dep| dep != document && !direct.contains(dep))
            .collect();
        Some(("import", targets))
    }
}

/// Put `links` before `</head>`, or at the top when there is no head
fn insert_links(text: &str, links: &str) -> String {
    let at = text.to_ascii_lowercase().find("</head").unwrap_or(0);
    let mut out = String::with_capacity(text.len() + links.len());
    out.push_str(&text[..at]);
    out.push_str(links);
    out.push_str(&text[at..]);
    out
}

/// Add one `rel` link per target to a markup item
async fn with_links(item: FileItem, rel: &str, targets: &[PathBuf]) -> Result<FileItem, BuildError> {
    if targets.is_empty() {
        return Ok(item);
    }

    let item = item.into_buffered().await?;
    let links: String = targets
        .iter()
        .map(|target| {
            format!(
                "<link rel=\"{}\" href=\"{}\">\n",
                rel,
                relative_href(item.path(), target)
            )
        })
        .collect();

    let rewritten = item.text().map(|text| insert_links(text, &links));
    match rewritten {
        Some(text) => {
            debug!("Added {} {} links to {}", targets.len(), rel, item.path().display());
            Ok(item.with_text(text))
        }
        None => Ok(item),
    }
}

#[async_trait]
impl Stage for PrefetchTransform {
    fn name(&self) -> &'static str {
        "prefetch"
    }

    async fn process(&self, item: FileItem, out: &Emitter) -> Result<(), BuildError> {
        let mut state = self.state.lock().await;
        state.seen.insert(item.path().to_path_buf());

        if item.kind() != ContentKind::Markup || !item.has_payload() {
            drop(state);
            return out.emit(item).await;
        }
        match self.hints_for(item.path()) {
            Some((rel, targets)) if !targets.is_empty() => {
                state.held.push((item, rel, targets));
                Ok(())
            }
            _ => {
                drop(state);
                out.emit(item).await
            }
        }
    }

    async fn flush(&self, out: &Emitter) -> Result<(), BuildError> {
        let Collected { seen, held } = std::mem::take(&mut *self.state.lock().await);
        for (item, rel, targets) in held {
            let present: Vec<PathBuf> = targets.into_iter().filter(|t| seen.contains(t)).collect();
            out.emit(with_links(item, rel, &present).await?).await?;
        }
        Ok(())
    }
}
