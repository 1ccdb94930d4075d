//! Split/rejoin of inline scripts and styles
//!
//! `split` pulls every inline `<script>` and `<style>` body out of a markup
//! document into its own file item, leaving an emptied shell behind. The
//! optimizers then see the fragments as ordinary scripts and styles. `rejoin`
//! waits until a shell and all of its fragments have come back and puts the
//! optimized bodies into the shell's empty regions.

use crate::core::{BuildError, ContentKind, FileItem};
use crate::html::{is_javascript_type, scan_tags, TagSpan};
use crate::pipeline::{Emitter, Stage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A document whose fragments are out being optimized
#[derive(Debug)]
struct PendingDocument {
    shell: Option<FileItem>,
    fragments: Vec<Option<String>>,
}

impl PendingDocument {
    fn is_complete(&self) -> bool {
        self.shell.is_some() && self.fragments.iter().all(Option::is_some)
    }
}

#[derive(Debug, Default)]
struct Registry {
    documents: HashMap<PathBuf, PendingDocument>,

    /// Fragment path -> (document path, region index)
    fragments: HashMap<PathBuf, (PathBuf, usize)>,
}

/// Shared state between one split stage and its matching rejoin stage
#[derive(Clone, Default)]
pub struct HtmlSplitter {
    registry: Arc<Mutex<Registry>>,
}

impl HtmlSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn split(&self) -> Arc<dyn Stage> {
        Arc::new(SplitStage {
            registry: self.registry.clone(),
        })
    }

    pub fn rejoin(&self) -> Arc<dyn Stage> {
        Arc::new(RejoinStage {
            registry: self.registry.clone(),
        })
    }
}

/// What an embedded region holds, which picks its fragment's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Embedded {
    Style,
    Script,
    Module,
}

impl Embedded {
    fn label_and_ext(self) -> (&'static str, &'static str) {
        match self {
            Embedded::Style => ("style", "css"),
            Embedded::Script => ("script", "js"),
            Embedded::Module => ("script", "mjs"),
        }
    }
}

/// Inline scripts (no `src`, JavaScript type) and every `<style>`
fn embedded_regions(path: &Path, text: &str) -> Result<Vec<(Embedded, Range<usize>)>, BuildError> {
    let tags = scan_tags(path, text, &["script", "style"])?;
    Ok(tags
        .into_iter()
        .filter_map(|tag: TagSpan| {
            let content = tag.content.clone()?;
            match tag.name.as_str() {
                "style" => Some((Embedded::Style, content)),
                "script" if !tag.has_attr("src") && is_javascript_type(tag.attr("type")) => {
                    let module = tag.attr("type").is_some_and(|t| t.trim().eq_ignore_ascii_case("module"));
                    Some((if module { Embedded::Module } else { Embedded::Script }, content))
                }
                _ => None,
            }
        })
        .collect())
}

fn fragment_path(document: &Path, embedded: Embedded, index: usize) -> PathBuf {
    let (label, ext) = embedded.label_and_ext();
    let name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    document.with_file_name(format!("{}_{}_{}.{}", name, label, index, ext))
}

struct SplitStage {
    registry: Arc<Mutex<Registry>>,
}

#[async_trait]
impl Stage for SplitStage {
    fn name(&self) -> &'static str {
        "html-split"
    }

    async fn process(&self, item: FileItem, out: &Emitter) -> Result<(), BuildError> {
        if item.kind() != ContentKind::Markup || !item.has_payload() {
            return out.emit(item).await;
        }

        let item = item.into_buffered().await?;
        let Some(text) = item.text().map(str::to_string) else {
            return out.emit(item).await;
        };

        let regions = embedded_regions(item.path(), &text)?;
        if regions.is_empty() {
            return out.emit(item).await;
        }

        let mut shell = String::with_capacity(text.len());
        let mut last = 0;
        let mut fragments = Vec::with_capacity(regions.len());
        for (index, (embedded, range)) in regions.iter().enumerate() {
            shell.push_str(&text[last..range.start]);
            last = range.end;
            let path = fragment_path(item.path(), *embedded, index);
            fragments.push(item.sibling(path, text[range.clone()].to_string()));
        }
        shell.push_str(&text[last..]);

        {
            let mut registry = self.registry.lock().await;
            for (index, fragment) in fragments.iter().enumerate() {
                registry
                    .fragments
                    .insert(fragment.path().to_path_buf(), (item.path().to_path_buf(), index));
            }
            registry.documents.insert(
                item.path().to_path_buf(),
                PendingDocument {
                    shell: None,
                    fragments: vec![None; fragments.len()],
                },
            );
        }

        debug!("Split {} fragments out of {}", fragments.len(), item.path().display());
        out.emit(item.with_text(shell)).await?;
        for fragment in fragments {
            out.emit(fragment).await?;
        }
        Ok(())
    }
}

struct RejoinStage {
    registry: Arc<Mutex<Registry>>,
}

impl RejoinStage {
    /// Record `item` if it belongs to a split document. Returns the item back
    /// when it does not, and the finished document once it is complete.
    async fn accept(&self, item: FileItem) -> Result<Accepted, BuildError> {
        let mut registry = self.registry.lock().await;

        let document = if let Some((document, index)) = registry.fragments.remove(item.path()) {
            let item = item.into_buffered().await?;
            let text = item.text().map(str::to_string).unwrap_or_default();
            let Some(pending) = registry.documents.get_mut(&document) else {
                return Err(BuildError::Rejoin {
                    path: document,
                    message: format!("fragment {} has no document", item.path().display()),
                });
            };
            pending.fragments[index] = Some(text);
            document
        } else if let Some(pending) = registry.documents.get_mut(item.path()) {
            let document = item.path().to_path_buf();
            pending.shell = Some(item.into_buffered().await?);
            document
        } else {
            return Ok(Accepted::Unrelated(item));
        };

        let complete = registry
            .documents
            .get(&document)
            .is_some_and(PendingDocument::is_complete);
        if !complete {
            return Ok(Accepted::Pending);
        }

        match registry.documents.remove(&document) {
            Some(pending) => Ok(Accepted::Complete(pending)),
            None => Ok(Accepted::Pending),
        }
    }
}

enum Accepted {
    Unrelated(FileItem),
    Pending,
    Complete(PendingDocument),
}

fn assemble(pending: PendingDocument) -> Result<FileItem, BuildError> {
    let PendingDocument { shell, fragments } = pending;
    let shell = shell.ok_or_else(|| BuildError::Rejoin {
        path: PathBuf::new(),
        message: "document shell missing".to_string(),
    })?;
    let text = shell.text().map(str::to_string).unwrap_or_default();

    let regions = embedded_regions(shell.path(), &text)?;
    if regions.len() != fragments.len() {
        return Err(BuildError::Rejoin {
            path: shell.path().to_path_buf(),
            message: format!(
                "document has {} embedded regions but {} fragments were split out",
                regions.len(),
                fragments.len()
            ),
        });
    }

    // Fill from the back so earlier ranges stay valid
    let mut out = text;
    for ((_, range), fragment) in regions.into_iter().zip(fragments).rev() {
        out.replace_range(range, &fragment.unwrap_or_default());
    }
    Ok(shell.with_text(out))
}

#[async_trait]
impl Stage for RejoinStage {
    fn name(&self) -> &'static str {
        "html-rejoin"
    }

    async fn process(&self, item: FileItem, out: &Emitter) -> Result<(), BuildError> {
        match self.accept(item).await? {
            Accepted::Unrelated(item) => out.emit(item).await,
            Accepted::Pending => Ok(()),
            Accepted::Complete(pending) => out.emit(assemble(pending)?).await,
        }
    }

    async fn flush(&self, _out: &Emitter) -> Result<(), BuildError> {
        let registry = self.registry.lock().await;
        match registry.documents.keys().min() {
            Some(path) => Err(BuildError::Rejoin {
                path: path.clone(),
                message: "not every fragment came back from the pipeline".to_string(),
            }),
            None => Ok(()),
        }
    }
}
