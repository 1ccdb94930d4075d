//! Markup scanning helpers
//!
//! Documents are parsed with `tl`; callers get back the byte ranges of the
//! elements they asked for so they can splice the source text without
//! re-serializing (and thereby normalizing) the rest of the document.
//!
//! `tl` reads script and style bodies as markup, so those bodies are blanked
//! out before parsing. Blanking keeps every byte offset in place.

use crate::core::BuildError;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// An element located in a markup document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpan {
    /// Lowercased tag name
    pub name: String,

    /// Attributes with lowercased names, in source order
    pub attributes: Vec<(String, Option<String>)>,

    /// Byte range of the whole element, closing tag included
    pub element: Range<usize>,

    /// Byte range between the opening and closing tag
    pub content: Option<Range<usize>>,
}

impl TagSpan {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|(key, _)| key == name)
    }

    /// Whether the space separated `rel` attribute contains `token`
    pub fn has_rel(&self, token: &str) -> bool {
        self.attr("rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|t| t.eq_ignore_ascii_case(token))
        })
    }
}

/// Locate every element named in `names`, in document order.
///
/// `path` is only used to label parse errors.
pub fn scan_tags(path: &Path, source: &str, names: &[&str]) -> Result<Vec<TagSpan>, BuildError> {
    let masked = mask_ranges(source, &raw_text_ranges(source));
    let dom = tl::parse(&masked, tl::ParserOptions::default()).map_err(|e| BuildError::Parse {
        path: path.to_path_buf(),
        message: format!("{:?}", e),
    })?;
    let parser = dom.parser();

    let mut spans = Vec::new();
    for node in dom.nodes() {
        let Some(tag) = node.as_tag() else {
            continue;
        };

        let name = tag.name().as_utf8_str().to_ascii_lowercase();
        if !names.contains(&name.as_str()) {
            continue;
        }

        let (start, _) = tag.boundaries(parser);
        let end = start + tag.raw().as_bytes().len();
        if end > masked.len() || !masked.is_char_boundary(start) || !masked.is_char_boundary(end) {
            continue;
        }

        let content = content_range(&masked[start..end], &name)
            .map(|inner| start + inner.start..start + inner.end);

        let attributes = tag
            .attributes()
            .iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value.map(|v| v.to_string())))
            .collect();

        spans.push(TagSpan {
            name,
            attributes,
            element: start..end,
            content,
        });
    }

    spans.sort_by_key(|span| span.element.start);
    Ok(spans)
}

/// Offset just past the `>` of the opening tag, skipping quoted attribute values
fn opening_tag_end(raw: &str) -> Option<usize> {
    let mut quote = None;
    for (i, b) in raw.bytes().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

/// Elements whose body is raw text, never markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Byte ranges of every script and style body in `source`.
///
/// Inside such a body a `<` opens nothing; only the element's own end tag
/// closes it. An unterminated body runs to the end of the document.
fn raw_text_ranges(source: &str) -> Vec<Range<usize>> {
    let lower = source.to_ascii_lowercase();
    let mut ranges = Vec::new();
    let mut pos = 0;

    while let Some(offset) = lower[pos..].find('<') {
        let at = pos + offset;
        let rest = &lower[at + 1..];

        if let Some(comment) = rest.strip_prefix("!--") {
            pos = match comment.find("-->") {
                Some(end) => at + 4 + end + 3,
                None => lower.len(),
            };
            continue;
        }

        let Some(name) = RAW_TEXT_ELEMENTS.iter().find(|name| starts_tag(rest, name)) else {
            // Step over whole opening tags so quoted attribute values are not scanned
            pos = if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
                opening_tag_end(&lower[at..]).map_or(at + 1, |end| at + end)
            } else {
                at + 1
            };
            continue;
        };

        let Some(open_end) = opening_tag_end(&lower[at..]) else {
            break;
        };
        let body_start = at + open_end;
        let body_end = find_end_tag(&lower[body_start..], name).map_or(lower.len(), |end| body_start + end);
        ranges.push(body_start..body_end);
        pos = body_end;
    }

    ranges
}

/// Whether `rest`, the text after a `<`, starts a tag called `name`
fn starts_tag(rest: &str, name: &str) -> bool {
    rest.strip_prefix(name).is_some_and(|after| {
        after.is_empty() || after.starts_with(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
    })
}

/// Offset of the first `</name` end tag in lowercased `text`
fn find_end_tag(text: &str, name: &str) -> Option<usize> {
    let mut pos = 0;
    while let Some(offset) = text[pos..].find("</") {
        let at = pos + offset;
        if starts_tag(&text[at + 2..], name) {
            return Some(at);
        }
        pos = at + 2;
    }
    None
}

/// Copy of `source` with every byte in `ranges` replaced by a space
fn mask_ranges(source: &str, ranges: &[Range<usize>]) -> String {
    let mut masked = String::with_capacity(source.len());
    let mut last = 0;
    for range in ranges {
        masked.push_str(&source[last..range.start]);
        masked.extend(std::iter::repeat(' ').take(range.len()));
        last = range.end;
    }
    masked.push_str(&source[last..]);
    masked
}

fn content_range(raw: &str, name: &str) -> Option<Range<usize>> {
    let open_end = opening_tag_end(raw)?;
    let close_start = raw.rfind("</")?;
    if close_start < open_end {
        return None;
    }
    if !raw[close_start + 2..].to_ascii_lowercase().starts_with(name) {
        return None;
    }
    Some(open_end..close_start)
}

/// Resolve a local reference found in `document` to a project-relative path.
///
/// Remote URLs, protocol-relative URLs, pure fragments and references that
/// climb out of the project root resolve to `None`.
pub fn resolve_reference(document: &Path, href: &str) -> Option<PathBuf> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("//") {
        return None;
    }
    if Url::parse(href).is_ok() {
        return None;
    }

    let href = href.split(['?', '#']).next().unwrap_or_default();
    if href.is_empty() {
        return None;
    }

    let joined = match href.strip_prefix('/') {
        Some(absolute) => PathBuf::from(absolute),
        None => document
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(href),
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            _ => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// URL of `target` relative to the directory holding `document`
pub fn relative_href(document: &Path, target: &Path) -> String {
    let from: Vec<_> = document
        .parent()
        .map(|dir| dir.components().collect())
        .unwrap_or_default();
    let to: Vec<_> = target.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = std::iter::repeat("..".to_string())
        .take(from.len() - common)
        .collect();
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

/// Whether a `<script>` carries classic or module JavaScript
pub fn is_javascript_type(script_type: Option<&str>) -> bool {
    match script_type.map(|t| t.trim().to_ascii_lowercase()) {
        None => true,
        Some(t) => matches!(
            t.as_str(),
            "" | "text/javascript" | "application/javascript" | "module"
        ),
    }
}
