//! Test utilities for assetline builds

use assetline::core::{BuildConfig, BuildError, BuildState, ProjectConfig};
use assetline::execution::{BuildEngine, BuildEvent, Builder};
use assetline::pipeline::dest::{DiskWriter, FsWriter};
use assetline::pipeline::FileStream;
use assetline::project::{Project, BUILD_DIR_NAME};
use assetline::service_worker::{ServiceWorkerGenerator, ServiceWorkerRequest};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Write `files` into a fresh project directory
pub fn fixture(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, contents) in files {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }
    dir
}

/// Load the project in `dir` with its `assetline.yaml`, or defaults
pub async fn load_project(dir: &Path) -> Arc<Project> {
    let config = ProjectConfig::discover(dir).unwrap();
    Arc::new(Project::load(&config).await.unwrap())
}

pub fn build_root(dir: &Path) -> PathBuf {
    dir.join(BUILD_DIR_NAME)
}

/// Root-relative paths of every file under `dir`, sorted
pub fn files_under(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

pub fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

pub fn named(name: &str) -> BuildConfig {
    BuildConfig {
        name: Some(name.to_string()),
        ..BuildConfig::default()
    }
}

/// Collects every event an engine emits
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<BuildEvent>>>,
}

impl EventLog {
    pub fn attach(&self, engine: BuildEngine) -> BuildEngine {
        let events = self.events.clone();
        engine.with_event_handler(move |event| events.lock().unwrap().push(event))
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().unwrap().clone()
    }
}

/// File system writer that lingers before reporting completion
pub struct SlowWriter {
    delay: Duration,
    finished: Arc<AtomicBool>,
}

impl SlowWriter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn finished_flag(&self) -> Arc<AtomicBool> {
        self.finished.clone()
    }
}

#[async_trait]
impl DiskWriter for SlowWriter {
    async fn write(&self, stream: FileStream, dest: &Path) -> Result<usize, BuildError> {
        let written = FsWriter.write(stream, dest).await?;
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(written)
    }
}

/// What a generator saw when it was invoked
#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub writer_finished: bool,
    pub files: Vec<String>,
    pub had_config: bool,
}

/// Service worker generator that records its calls instead of writing
pub struct RecordingGenerator {
    writer_finished: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<GenerateCall>>>,
}

impl RecordingGenerator {
    pub fn new(writer_finished: Arc<AtomicBool>) -> Self {
        Self {
            writer_finished,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceWorkerGenerator for RecordingGenerator {
    async fn generate(&self, request: ServiceWorkerRequest) -> Result<(), BuildError> {
        self.calls.lock().unwrap().push(GenerateCall {
            writer_finished: self.writer_finished.load(Ordering::SeqCst),
            files: files_under(&request.build_root),
            had_config: request.sw_config.is_some(),
        });
        Ok(())
    }
}

/// Builder that drops a marker file into its output directory
pub struct MarkerBuilder {
    build_root: PathBuf,
    delays: HashMap<String, Duration>,
    failing: Vec<String>,
    finished: Arc<Mutex<Vec<String>>>,
}

impl MarkerBuilder {
    pub fn new(build_root: impl Into<PathBuf>) -> Self {
        Self {
            build_root: build_root.into(),
            delays: HashMap::new(),
            failing: Vec::new(),
            finished: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    /// Names of builds that ran to the end, in completion order
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl Builder for MarkerBuilder {
    async fn build(&self, config: &BuildConfig) -> Result<BuildState, BuildError> {
        let name = config.name().to_string();
        let mut state = BuildState::new(&name);
        state.start();

        if let Some(delay) = self.delays.get(&name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&name) {
            state.fail();
            return Err(BuildError::Bundle(format!("{} broke", name)));
        }

        let dir = self.build_root.join(&name);
        std::fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;
        let marker = dir.join("marker.txt");
        std::fs::write(&marker, &name).map_err(|e| BuildError::io(&marker, e))?;

        state.files_written = 1;
        state.complete();
        self.finished.lock().unwrap().push(name);
        Ok(state)
    }
}
