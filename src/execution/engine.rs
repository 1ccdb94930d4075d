//! Build engine - runs one build variant from sources to written output

use crate::{
    core::{BuildConfig, BuildError, BuildPhase, BuildState, OptimizeOptions},
    pipeline::{
        optimize_stages, DiskWriter, FileStream, FsWriter, HtmlSplitter, InlineBundler,
        PrefetchTransform, Stage, Toolchain,
    },
    project::SourceProvider,
    service_worker::{
        FsSwConfigLoader, PrecacheGenerator, ServiceWorkerGenerator, ServiceWorkerRequest,
        SwConfigLoader, DEFAULT_SW_CONFIG,
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Events that can occur during a build run
#[derive(Debug, Clone)]
pub enum BuildEvent {
    BuildStarted {
        execution_id: Uuid,
        build_name: String,
    },
    PhaseChanged {
        build_name: String,
        phase: BuildPhase,
    },
    /// A service worker was requested but its config file does not exist
    ServiceWorkerConfigMissing {
        build_name: String,
        path: PathBuf,
    },
    BuildCompleted {
        execution_id: Uuid,
        build_name: String,
        files_written: usize,
    },
    BuildFailed {
        execution_id: Uuid,
        build_name: String,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(BuildEvent) + Send + Sync>;

/// Creates a fresh bundling stage for every run
pub type BundlerFactory = Arc<dyn Fn() -> Arc<dyn Stage> + Send + Sync>;

/// Runs build variants of one project
///
/// Collaborators are injected at construction time; the defaults write to
/// the local file system and use the built-in bundler and service worker
/// generator.
pub struct BuildEngine {
    project: Arc<dyn SourceProvider>,
    build_root: PathBuf,
    toolchain: Toolchain,
    writer: Arc<dyn DiskWriter>,
    bundler: BundlerFactory,
    sw_loader: Arc<dyn SwConfigLoader>,
    sw_generator: Arc<dyn ServiceWorkerGenerator>,
    event_handlers: Vec<EventHandler>,
}

impl BuildEngine {
    pub fn new(project: Arc<dyn SourceProvider>, build_root: impl Into<PathBuf>) -> Self {
        let keep_external = vec![project.components_dir().to_path_buf()];
        Self {
            project,
            build_root: build_root.into(),
            toolchain: Toolchain::default(),
            writer: Arc::new(FsWriter),
            bundler: Arc::new(move || Arc::new(InlineBundler::new(keep_external.clone())) as Arc<dyn Stage>),
            sw_loader: Arc::new(FsSwConfigLoader),
            sw_generator: Arc::new(PrecacheGenerator),
            event_handlers: Vec::new(),
        }
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn DiskWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_bundler(mut self, bundler: BundlerFactory) -> Self {
        self.bundler = bundler;
        self
    }

    pub fn with_sw_loader(mut self, loader: Arc<dyn SwConfigLoader>) -> Self {
        self.sw_loader = loader;
        self
    }

    pub fn with_sw_generator(mut self, generator: Arc<dyn ServiceWorkerGenerator>) -> Self {
        self.sw_generator = generator;
        self
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(BuildEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: BuildEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    fn enter(&self, state: &mut BuildState, phase: BuildPhase) {
        if state.advance(phase) {
            debug!("({}) {:?}", state.name, phase);
            self.emit_event(BuildEvent::PhaseChanged {
                build_name: state.name.clone(),
                phase,
            });
        }
    }

    /// split -> optimize -> rejoin, with a splitter of its own
    fn optimized(&self, stream: FileStream, options: &OptimizeOptions) -> FileStream {
        let splitter = HtmlSplitter::new();
        let mut stages = vec![splitter.split()];
        stages.extend(optimize_stages(options, &self.toolchain));
        stages.push(splitter.rejoin());
        stream.pipe_all(stages)
    }

    /// Run one build variant to completion
    pub async fn build(&self, config: &BuildConfig) -> Result<BuildState, BuildError> {
        let mut state = BuildState::new(config.name());
        state.start();
        let execution_id = state.execution_id;
        let build_dir = self.build_root.join(&state.name);

        match self.run(config, &mut state, &build_dir).await {
            Ok(()) => {
                state.complete();
                info!("({}) Build complete!", state.name);
                self.emit_event(BuildEvent::BuildCompleted {
                    execution_id,
                    build_name: state.name.clone(),
                    files_written: state.files_written,
                });
                Ok(state)
            }
            Err(e) => {
                state.fail();
                error!("({}) Build failed: {}", state.name, e);
                self.emit_event(BuildEvent::BuildFailed {
                    execution_id,
                    build_name: state.name.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        config: &BuildConfig,
        state: &mut BuildState,
        build_dir: &Path,
    ) -> Result<(), BuildError> {
        config.validate()?;
        let options = config.optimize_options();
        let name = state.name.clone();

        self.enter(state, BuildPhase::Streaming);
        info!("({}) Building...", name);
        self.emit_event(BuildEvent::BuildStarted {
            execution_id: state.execution_id,
            build_name: name.clone(),
        });

        let sources = self.optimized(self.project.sources(), &options);
        let dependencies = self.optimized(self.project.dependencies(), &options);

        self.enter(state, BuildPhase::Merging);
        let mut stream = sources.merge(dependencies);

        if config.bundle {
            self.enter(state, BuildPhase::Bundling);
            stream = stream.pipe((self.bundler)());
        }

        if config.insert_prefetch_links {
            self.enter(state, BuildPhase::Prefetching);
            stream = stream.pipe(Arc::new(PrefetchTransform::new(self.project.graph())));
        }

        self.enter(state, BuildPhase::Writing);
        let write = self.writer.write(stream, build_dir);

        if !config.add_service_worker {
            state.files_written = write.await?;
            return Ok(());
        }

        // The config load is independent of the output, so it overlaps the
        // write. Generation itself must wait for the write to finish.
        let sw_path = self.project.root().join(
            config
                .sw_precache_config
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_SW_CONFIG)),
        );
        let (written, sw_config) = tokio::join!(write, self.sw_loader.load(&sw_path));
        state.files_written = written?;
        let sw_config = sw_config?;

        self.enter(state, BuildPhase::ServiceWorker);
        debug!("({}) Generating service worker...", name);
        match &sw_config {
            Some(found) => debug!("({}) Service worker config found: {:?}", name, found),
            None => {
                info!(
                    "({}) No service worker configuration found at {}, continuing with defaults",
                    name,
                    sw_path.display()
                );
                self.emit_event(BuildEvent::ServiceWorkerConfigMissing {
                    build_name: name.clone(),
                    path: sw_path.clone(),
                });
            }
        }

        self.sw_generator
            .generate(ServiceWorkerRequest {
                build_root: build_dir.to_path_buf(),
                graph: self.project.graph(),
                sw_config,
                bundled: config.bundle,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileItem;
    use crate::project::{DependencyGraph, ImportGraph};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticProject {
        sources: Vec<(&'static str, &'static str)>,
        graph: Arc<ImportGraph>,
    }

    impl StaticProject {
        fn new(sources: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                sources,
                graph: Arc::new(ImportGraph::from_references(
                    PathBuf::from("index.html"),
                    None,
                    Vec::new(),
                    HashMap::new(),
                )),
            }
        }
    }

    impl SourceProvider for StaticProject {
        fn root(&self) -> &Path {
            Path::new("/project")
        }

        fn components_dir(&self) -> &Path {
            Path::new("bower_components")
        }

        fn sources(&self) -> FileStream {
            FileStream::from_items(
                self.sources
                    .iter()
                    .map(|(path, text)| FileItem::buffered("/project", *path, *text))
                    .collect(),
            )
        }

        fn dependencies(&self) -> FileStream {
            FileStream::from_items(Vec::new())
        }

        fn graph(&self) -> Arc<dyn DependencyGraph> {
            self.graph.clone()
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<BuildEvent>>>, impl Fn(BuildEvent) + Send + Sync + 'static) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        (events, move |event| sink.lock().unwrap().push(event))
    }

    #[tokio::test]
    async fn test_build_writes_sources_under_build_name() {
        let dir = tempfile::tempdir().unwrap();
        let project = Arc::new(StaticProject::new(vec![
            ("index.html", "<p>index</p>"),
            ("src/app.js", "run()"),
        ]));
        let (events, handler) = recorder();
        let engine = BuildEngine::new(project, dir.path()).with_event_handler(handler);

        let config = BuildConfig {
            name: Some("es6".to_string()),
            ..BuildConfig::default()
        };
        let state = engine.build(&config).await.unwrap();

        assert_eq!(state.phase, BuildPhase::Complete);
        assert_eq!(state.files_written, 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("es6/src/app.js")).unwrap(),
            "run()"
        );

        let events = events.lock().unwrap();
        let phases: Vec<BuildPhase> = events
            .iter()
            .filter_map(|e| match e {
                BuildEvent::PhaseChanged { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![BuildPhase::Streaming, BuildPhase::Merging, BuildPhase::Writing]
        );
        assert!(matches!(events.last(), Some(BuildEvent::BuildCompleted { files_written: 2, .. })));
    }

    #[tokio::test]
    async fn test_stage_failure_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let project = Arc::new(StaticProject::new(vec![("src/broken.js", "function (")]));
        let (events, handler) = recorder();
        let engine = BuildEngine::new(project, dir.path()).with_event_handler(handler);

        let config = BuildConfig {
            js: Some(crate::core::JsOptions {
                minify: true,
                compile: false,
            }),
            ..BuildConfig::default()
        };
        let err = engine.build(&config).await.unwrap_err();

        assert!(matches!(err, BuildError::Optimize { .. }));
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(BuildEvent::BuildFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_escaping_build_name_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("build");
        let project = Arc::new(StaticProject::new(vec![("index.html", "<p>index</p>")]));
        let engine = BuildEngine::new(project, &root);

        let config = BuildConfig {
            name: Some("../outside".to_string()),
            ..BuildConfig::default()
        };
        let err = engine.build(&config).await.unwrap_err();

        assert!(matches!(err, BuildError::Config(_)));
        assert!(!dir.path().join("outside").exists());
        assert!(!root.exists());
    }
}
