//! Custom-elements ES5 adapter insertion
//!
//! Once classes are compiled down to ES5, browsers with native custom
//! elements need `custom-elements-es5-adapter.js` loaded before the
//! webcomponents loader. This stage adds that script next to the loader.

use crate::core::{BuildError, ContentKind, FileItem};
use crate::html::scan_tags;
use crate::pipeline::{Emitter, Stage};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;
use url::Url;

/// Substring that has to be present before a document is parsed at all
const LOADER_MARKER: &str = "webcomponents-loader.js";

const ADAPTER_SCRIPT: &str = "custom-elements-es5-adapter.js";

/// Conditional rewrite of documents that include the webcomponents loader
pub struct UseEs5WebcomponentsLoader {
    loader_src: Regex,
}

impl UseEs5WebcomponentsLoader {
    pub fn new() -> Self {
        Self {
            loader_src: Regex::new(r"\bwebcomponents-loader\.js$").expect("static regex"),
        }
    }

    /// Rewrite one item.
    ///
    /// Items that are not markup, carry no payload or do not reference the
    /// loader come back as they went in. A rewritten document is a new item
    /// with the same path.
    pub async fn rewrite(&self, item: FileItem) -> Result<FileItem, BuildError> {
        if !item.has_payload() || item.kind() != ContentKind::Markup {
            return Ok(item);
        }

        let item = item.into_buffered().await?;
        let rewritten = match item.text() {
            Some(text) if text.contains(LOADER_MARKER) => self.insert_adapter(&item, text)?,
            _ => None,
        };

        match rewritten {
            Some(text) => {
                debug!("Inserted {} into {}", ADAPTER_SCRIPT, item.path().display());
                Ok(item.with_text(text))
            }
            None => Ok(item),
        }
    }

    fn insert_adapter(&self, item: &FileItem, text: &str) -> Result<Option<String>, BuildError> {
        let scripts = scan_tags(item.path(), text, &["script"])?;
        let Some((loader, src)) = scripts.iter().find_map(|tag| {
            tag.attr("src")
                .filter(|src| self.loader_src.is_match(src))
                .map(|src| (tag, src))
        }) else {
            return Ok(None);
        };

        let adapter = format!(
            r#"<script src="{}"></script>"#,
            resolve_sibling(src, ADAPTER_SCRIPT)
        );

        let at = loader.element.start;
        let mut out = String::with_capacity(text.len() + adapter.len());
        out.push_str(&text[..at]);
        out.push_str(&adapter);
        out.push_str(&text[at..]);
        Ok(Some(out))
    }
}

impl Default for UseEs5WebcomponentsLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for UseEs5WebcomponentsLoader {
    fn name(&self) -> &'static str {
        "es5-webcomponents-loader"
    }

    async fn process(&self, item: FileItem, out: &Emitter) -> Result<(), BuildError> {
        let item = self.rewrite(item).await?;
        out.emit(item).await
    }
}

/// Resolve `name` against the URL `base`, the way a browser resolves a
/// relative reference found in a document served from `base`
fn resolve_sibling(base: &str, name: &str) -> String {
    if let Ok(joined) = Url::parse(base).and_then(|url| url.join(name)) {
        return joined.to_string();
    }
    let base = base.split(['?', '#']).next().unwrap_or_default();
    match base.rfind('/') {
        Some(slash) => format!("{}{}", &base[..=slash], name),
        None => name.to_string(),
    }
}
