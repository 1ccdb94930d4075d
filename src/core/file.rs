//! File items - the unit of data flowing through a build pipeline

use crate::core::BuildError;
use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// An open, readable payload handle
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// What kind of content a file carries, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Markup,
    Script,
    Style,
    Other,
}

impl ContentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("html") | Some("htm") => ContentKind::Markup,
            Some("js") | Some("mjs") => ContentKind::Script,
            Some("css") => ContentKind::Style,
            _ => ContentKind::Other,
        }
    }
}

/// Payload of a file item. Exactly one representation is active.
pub enum Contents {
    /// No payload (e.g. a directory entry)
    Empty,
    /// Complete in-memory payload
    Buffered(Bytes),
    /// Payload still to be read from an open handle
    Streamed(ContentReader),
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Empty => write!(f, "Empty"),
            Contents::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            Contents::Streamed(_) => write!(f, "Streamed"),
        }
    }
}

/// A single asset flowing through the pipeline
///
/// Items are value records: stages never mutate an item they received, they
/// build a new one with [`FileItem::with_contents`] or [`FileItem::with_text`].
#[derive(Debug)]
pub struct FileItem {
    base: PathBuf,
    path: PathBuf,
    kind: ContentKind,
    contents: Contents,
}

impl FileItem {
    /// Create an item; the content kind is derived from `path`
    pub fn new(base: impl Into<PathBuf>, path: impl Into<PathBuf>, contents: Contents) -> Self {
        let path = path.into();
        Self {
            base: base.into(),
            kind: ContentKind::from_path(&path),
            path,
            contents,
        }
    }

    pub fn buffered(base: impl Into<PathBuf>, path: impl Into<PathBuf>, bytes: impl Into<Bytes>) -> Self {
        Self::new(base, path, Contents::Buffered(bytes.into()))
    }

    pub fn streamed<R>(base: impl Into<PathBuf>, path: impl Into<PathBuf>, reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::new(base, path, Contents::Streamed(Box::pin(reader)))
    }

    /// Logical path, relative to [`FileItem::base`]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn contents(&self) -> &Contents {
        &self.contents
    }

    pub fn has_payload(&self) -> bool {
        !matches!(self.contents, Contents::Empty)
    }

    pub fn has_buffered_payload(&self) -> bool {
        matches!(self.contents, Contents::Buffered(_))
    }

    pub fn has_streamed_payload(&self) -> bool {
        matches!(self.contents, Contents::Streamed(_))
    }

    /// The in-memory payload, if this item is buffered
    pub fn buffer(&self) -> Option<&Bytes> {
        match &self.contents {
            Contents::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Buffered payload as text. `None` for empty, streamed and non-UTF-8
    /// payloads; text transforms pass such items through untouched.
    pub fn text(&self) -> Option<&str> {
        self.buffer().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Materialize a streamed payload into memory.
    ///
    /// The reader is consumed; the returned item owns the only copy of the
    /// payload. Buffered and empty items are returned as they are.
    pub async fn into_buffered(self) -> Result<FileItem, BuildError> {
        match self.contents {
            Contents::Streamed(mut reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| BuildError::io(self.base.join(&self.path), e))?;
                Ok(FileItem {
                    base: self.base,
                    path: self.path,
                    kind: self.kind,
                    contents: Contents::Buffered(Bytes::from(buf)),
                })
            }
            _ => Ok(self),
        }
    }

    /// A new item with the same path and a different payload
    pub fn with_contents(&self, bytes: impl Into<Bytes>) -> FileItem {
        FileItem {
            base: self.base.clone(),
            path: self.path.clone(),
            kind: self.kind,
            contents: Contents::Buffered(bytes.into()),
        }
    }

    pub fn with_text(&self, text: String) -> FileItem {
        self.with_contents(text.into_bytes())
    }

    /// A new buffered item next to this one, sharing its base directory
    pub fn sibling(&self, path: impl Into<PathBuf>, bytes: impl Into<Bytes>) -> FileItem {
        FileItem::buffered(self.base.clone(), path, bytes)
    }

    pub fn into_contents(self) -> Contents {
        self.contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(ContentKind::from_path(Path::new("index.html")), ContentKind::Markup);
        assert_eq!(ContentKind::from_path(Path::new("a/B.HTM")), ContentKind::Markup);
        assert_eq!(ContentKind::from_path(Path::new("app.js")), ContentKind::Script);
        assert_eq!(ContentKind::from_path(Path::new("theme.css")), ContentKind::Style);
        assert_eq!(ContentKind::from_path(Path::new("logo.png")), ContentKind::Other);
        assert_eq!(ContentKind::from_path(Path::new("LICENSE")), ContentKind::Other);
    }

    #[tokio::test]
    async fn test_materialize_streamed_payload() {
        let item = FileItem::streamed("/project", "src/app.js", std::io::Cursor::new(b"let a = 1;".to_vec()));
        assert!(item.has_streamed_payload());
        assert!(item.buffer().is_none());

        let item = item.into_buffered().await.unwrap();
        assert!(item.has_buffered_payload());
        assert!(!item.has_streamed_payload());
        assert_eq!(item.text().unwrap(), "let a = 1;");
        assert_eq!(item.path(), Path::new("src/app.js"));
        assert_eq!(item.kind(), ContentKind::Script);
    }

    #[tokio::test]
    async fn test_materialize_keeps_buffer_untouched() {
        let item = FileItem::buffered("/project", "a.css", "p{}");
        let ptr = item.buffer().unwrap().as_ptr();
        let item = item.into_buffered().await.unwrap();
        assert_eq!(item.buffer().unwrap().as_ptr(), ptr);
    }

    #[test]
    fn test_with_text_builds_new_record() {
        let original = FileItem::buffered("/project", "index.html", "<p>old</p>");
        let updated = original.with_text("<p>new</p>".to_string());

        assert_eq!(original.text().unwrap(), "<p>old</p>");
        assert_eq!(updated.text().unwrap(), "<p>new</p>");
        assert_eq!(updated.path(), original.path());
        assert_eq!(updated.base(), original.base());
        assert_eq!(updated.kind(), ContentKind::Markup);
    }

    #[test]
    fn test_invalid_utf8_has_no_text() {
        let item = FileItem::buffered("/project", "legacy.html", &b"<p>caf\xe9</p>"[..]);
        assert!(item.has_buffered_payload());
        assert!(item.text().is_none());
    }

    #[test]
    fn test_empty_item_has_no_payload() {
        let item = FileItem::new("/project", "src", Contents::Empty);
        assert!(!item.has_payload());
        assert!(item.text().is_none());
    }
}
