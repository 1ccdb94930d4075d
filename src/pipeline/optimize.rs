//! Optimization stage composer
//!
//! Turns per-kind optimization options into an ordered chain of stages. Each
//! stage only touches items of its own content kind; everything else streams
//! through without being buffered.

use crate::core::{BuildError, ContentKind, FileItem, OptimizeOptions};
use crate::pipeline::command::CommandCompiler;
use crate::pipeline::minify::{minify_css, minify_html, minify_js};
use crate::pipeline::{Emitter, Stage, UseEs5WebcomponentsLoader};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A whole-payload optimizer for one content kind
#[async_trait]
pub trait Optimizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Items of any other kind are passed through untouched
    fn kind(&self) -> ContentKind;

    async fn optimize(&self, path: &Path, source: &str) -> Result<String, String>;
}

/// Runs a CPU-bound minifier on the blocking pool
async fn off_thread<F>(work: F) -> Result<String, String>
where
    F: FnOnce() -> Result<String, String> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| format!("minifier task failed: {}", e))?
}

pub struct JsMinifier;

#[async_trait]
impl Optimizer for JsMinifier {
    fn name(&self) -> &'static str {
        "js-minify"
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Script
    }

    async fn optimize(&self, path: &Path, source: &str) -> Result<String, String> {
        let module = path.extension().is_some_and(|ext| ext == "mjs");
        let source = source.to_string();
        off_thread(move || minify_js(&source, module)).await
    }
}

pub struct CssMinifier;

#[async_trait]
impl Optimizer for CssMinifier {
    fn name(&self) -> &'static str {
        "css-minify"
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Style
    }

    async fn optimize(&self, _path: &Path, source: &str) -> Result<String, String> {
        let source = source.to_string();
        off_thread(move || minify_css(&source)).await
    }
}

pub struct HtmlMinifier;

#[async_trait]
impl Optimizer for HtmlMinifier {
    fn name(&self) -> &'static str {
        "html-minify"
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Markup
    }

    async fn optimize(&self, _path: &Path, source: &str) -> Result<String, String> {
        let source = source.to_string();
        off_thread(move || Ok(minify_html(&source))).await
    }
}

/// Script compilation through an external command
pub struct JsCompiler {
    compiler: CommandCompiler,
}

impl JsCompiler {
    pub fn new(compiler: CommandCompiler) -> Self {
        Self { compiler }
    }
}

#[async_trait]
impl Optimizer for JsCompiler {
    fn name(&self) -> &'static str {
        "js-compile"
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Script
    }

    async fn optimize(&self, _path: &Path, source: &str) -> Result<String, String> {
        self.compiler.compile(source).await
    }
}

/// Runs one optimizer over the items of its kind
pub struct OptimizeStage {
    optimizer: Arc<dyn Optimizer>,
}

impl OptimizeStage {
    pub fn new(optimizer: Arc<dyn Optimizer>) -> Self {
        Self { optimizer }
    }
}

#[async_trait]
impl Stage for OptimizeStage {
    fn name(&self) -> &'static str {
        self.optimizer.name()
    }

    async fn process(&self, item: FileItem, out: &Emitter) -> Result<(), BuildError> {
        if item.kind() != self.optimizer.kind() || !item.has_payload() {
            return out.emit(item).await;
        }

        // The optimizers need the complete payload
        let item = item.into_buffered().await?;
        let optimized = match item.text() {
            Some(source) => self
                .optimizer
                .optimize(item.path(), source)
                .await
                .map_err(|message| BuildError::Optimize {
                    optimizer: self.optimizer.name(),
                    path: item.path().to_path_buf(),
                    message,
                })?,
            None => return out.emit(item).await,
        };

        debug!("{}: {}", self.optimizer.name(), item.path().display());
        out.emit(item.with_text(optimized)).await
    }
}

/// External tools used by the optimization chain
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    pub compiler: CommandCompiler,
}

impl Toolchain {
    /// Toolchain using `command` as the script compiler
    pub fn with_compiler(command: Vec<String>) -> Self {
        Self {
            compiler: CommandCompiler::new(command, 120),
        }
    }
}

/// Build the optimization chain for `options`.
///
/// Order: compile scripts, minify scripts, minify styles, minify markup,
/// then (only when compiling) insert the custom-elements ES5 adapter.
pub fn optimize_stages(options: &OptimizeOptions, toolchain: &Toolchain) -> Vec<Arc<dyn Stage>> {
    let mut optimizers: Vec<Arc<dyn Optimizer>> = Vec::new();

    if options.js_compile() {
        optimizers.push(Arc::new(JsCompiler::new(toolchain.compiler.clone())));
    }
    if options.js_minify() {
        optimizers.push(Arc::new(JsMinifier));
    }
    if options.css_minify() {
        optimizers.push(Arc::new(CssMinifier));
    }
    if options.html_minify() {
        optimizers.push(Arc::new(HtmlMinifier));
    }

    let mut stages: Vec<Arc<dyn Stage>> = optimizers
        .into_iter()
        .map(|optimizer| Arc::new(OptimizeStage::new(optimizer)) as Arc<dyn Stage>)
        .collect();

    if options.js_compile() {
        stages.push(Arc::new(UseEs5WebcomponentsLoader::new()));
    }

    stages
}
