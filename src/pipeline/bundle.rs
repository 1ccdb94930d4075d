//! Inline bundler
//!
//! Collects the merged stream, then inlines local scripts and stylesheets
//! into the documents that reference them. Inlined files are dropped from
//! the output; everything else is emitted in arrival order.

use crate::core::{BuildError, ContentKind, FileItem};
use crate::html::{resolve_reference, scan_tags, TagSpan};
use crate::pipeline::{Emitter, Stage};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct InlineBundler {
    /// Targets under these directories stay external
    keep_external: Vec<PathBuf>,
    held: Mutex<Vec<FileItem>>,
    script_close: Regex,
    style_close: Regex,
}

impl InlineBundler {
    pub fn new(keep_external: Vec<PathBuf>) -> Self {
        Self {
            keep_external,
            held: Mutex::new(Vec::new()),
            script_close: Regex::new(r"(?i)</(script)").expect("static regex"),
            style_close: Regex::new(r"(?i)</(style)").expect("static regex"),
        }
    }

    fn is_external(&self, path: &Path) -> bool {
        self.keep_external.iter().any(|dir| path.starts_with(dir))
    }

    /// Inline what `document` references. Returns `None` when nothing was
    /// inlined, together with the paths that were.
    fn inline_document(
        &self,
        document: &FileItem,
        assets: &HashMap<PathBuf, String>,
    ) -> Result<(Option<String>, Vec<PathBuf>), BuildError> {
        let Some(text) = document.text() else {
            return Ok((None, Vec::new()));
        };
        let tags = scan_tags(document.path(), text, &["script", "link"])?;

        let mut replacements = Vec::new();
        let mut inlined = Vec::new();
        for tag in &tags {
            let (href, wrapper) = match tag.name.as_str() {
                "script" => match tag.attr("src") {
                    Some(src) => (src, "script"),
                    None => continue,
                },
                "link" if tag.has_rel("stylesheet") => match tag.attr("href") {
                    Some(href) => (href, "style"),
                    None => continue,
                },
                _ => continue,
            };

            let Some(target) = resolve_reference(document.path(), href) else {
                continue;
            };
            if self.is_external(&target) {
                continue;
            }
            let Some(body) = assets.get(&target) else {
                continue;
            };

            let element = match wrapper {
                "script" => format!(
                    "<script{}>{}</script>",
                    render_attributes(tag, &["src"]),
                    self.script_close.replace_all(body, r"<\/$1")
                ),
                _ => format!(
                    "<style{}>{}</style>",
                    render_attributes(tag, &["rel", "href"]),
                    self.style_close.replace_all(body, r"<\/$1")
                ),
            };
            replacements.push((tag.element.clone(), element));
            inlined.push(target);
        }

        if replacements.is_empty() {
            return Ok((None, inlined));
        }

        let mut out = text.to_string();
        for (range, element) in replacements.into_iter().rev() {
            out.replace_range(range, &element);
        }
        Ok((Some(out), inlined))
    }
}

/// Attributes of `tag` minus `skip`, with a leading space
fn render_attributes(tag: &TagSpan, skip: &[&str]) -> String {
    let mut out = String::new();
    for (key, value) in &tag.attributes {
        if skip.contains(&key.as_str()) {
            continue;
        }
        out.push(' ');
        out.push_str(key);
        if let Some(value) = value {
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }
    out
}

#[async_trait]
impl Stage for InlineBundler {
    fn name(&self) -> &'static str {
        "bundle"
    }

    async fn process(&self, item: FileItem, out: &Emitter) -> Result<(), BuildError> {
        match item.kind() {
            ContentKind::Markup | ContentKind::Script | ContentKind::Style => {
                let item = item.into_buffered().await?;
                self.held.lock().await.push(item);
                Ok(())
            }
            ContentKind::Other => out.emit(item).await,
        }
    }

    async fn flush(&self, out: &Emitter) -> Result<(), BuildError> {
        let held = std::mem::take(&mut *self.held.lock().await);

        let assets: HashMap<PathBuf, String> = held
            .iter()
            .filter(|item| item.kind() != ContentKind::Markup)
            .filter_map(|item| {
                item.text()
                    .map(|text| (item.path().to_path_buf(), text.to_string()))
            })
            .collect();

        let mut inlined = HashSet::new();
        let mut documents = HashMap::new();
        for item in held.iter().filter(|item| item.kind() == ContentKind::Markup) {
            let (rewritten, targets) = self.inline_document(item, &assets)?;
            if let Some(text) = rewritten {
                debug!("Inlined {} files into {}", targets.len(), item.path().display());
                documents.insert(item.path().to_path_buf(), text);
            }
            inlined.extend(targets);
        }

        let total = held.len();
        for item in held {
            if let Some(text) = documents.remove(item.path()) {
                out.emit(item.with_text(text)).await?;
            } else if !inlined.contains(item.path()) {
                out.emit(item).await?;
            }
        }

        info!("Bundled {} files, {} inlined", total, inlined.len());
        Ok(())
    }
}
