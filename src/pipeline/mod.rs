//! Stream plumbing for build pipelines
//!
//! Every stage runs in its own task and talks to its neighbours through a
//! bounded channel. A stage that falls behind makes `emit` wait, which in
//! turn stops the stage feeding it: back-pressure without unbounded buffering.

pub mod bundle;
pub mod command;
pub mod dest;
pub mod minify;
pub mod optimize;
pub mod prefetch;
pub mod rewrite;
pub mod split;

use crate::core::{BuildError, FileItem};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub use bundle::InlineBundler;
pub use dest::{DiskWriter, FsWriter};
pub use optimize::{optimize_stages, Optimizer, Toolchain};
pub use prefetch::PrefetchTransform;
pub use rewrite::UseEs5WebcomponentsLoader;
pub use split::HtmlSplitter;

/// Items buffered between two stages
pub const CHANNEL_CAPACITY: usize = 16;

/// A transform in a pipeline.
///
/// `process` sees every item in arrival order and may emit zero, one or many
/// items for it. `flush` runs once after the input ends, for stages that hold
/// items back.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, item: FileItem, out: &Emitter) -> Result<(), BuildError>;

    async fn flush(&self, _out: &Emitter) -> Result<(), BuildError> {
        Ok(())
    }
}

/// Sending half of a stage's output channel
#[derive(Clone)]
pub struct Emitter {
    stage: &'static str,
    tx: mpsc::Sender<FileItem>,
}

impl Emitter {
    /// Hand an item downstream, waiting while the channel is full
    pub async fn emit(&self, item: FileItem) -> Result<(), BuildError> {
        self.tx
            .send(item)
            .await
            .map_err(|_| BuildError::StreamClosed(self.stage))
    }
}

/// A stream of file items together with the tasks producing it
pub struct FileStream {
    rx: mpsc::Receiver<FileItem>,
    tasks: Vec<JoinHandle<Result<(), BuildError>>>,
}

impl FileStream {
    fn channel(stage: &'static str) -> (Emitter, mpsc::Receiver<FileItem>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Emitter { stage, tx }, rx)
    }

    /// Start a producer task and expose what it emits as a stream
    pub fn spawn<F, Fut>(name: &'static str, producer: F) -> FileStream
    where
        F: FnOnce(Emitter) -> Fut,
        Fut: std::future::Future<Output = Result<(), BuildError>> + Send + 'static,
    {
        let (emitter, rx) = Self::channel(name);
        let task = tokio::spawn(producer(emitter));
        FileStream {
            rx,
            tasks: vec![task],
        }
    }

    pub fn from_items(items: Vec<FileItem>) -> FileStream {
        Self::spawn("items", |out| async move {
            for item in items {
                out.emit(item).await?;
            }
            Ok(())
        })
    }

    /// Run every item through `stage`
    pub fn pipe(self, stage: Arc<dyn Stage>) -> FileStream {
        let FileStream { mut rx, mut tasks } = self;
        let (emitter, next_rx) = Self::channel(stage.name());

        tasks.push(tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                stage.process(item, &emitter).await?;
            }
            stage.flush(&emitter).await?;
            debug!("Stage '{}' finished", stage.name());
            Ok(())
        }));

        FileStream { rx: next_rx, tasks }
    }

    pub fn pipe_all(self, stages: Vec<Arc<dyn Stage>>) -> FileStream {
        stages.into_iter().fold(self, |stream, stage| stream.pipe(stage))
    }

    /// Interleave two streams. Each side keeps its own order; there is no
    /// ordering between the two.
    pub fn merge(self, other: FileStream) -> FileStream {
        let (emitter, rx) = Self::channel("merge");
        let mut tasks = self.tasks;
        tasks.extend(other.tasks);

        for mut input in [self.rx, other.rx] {
            let out = emitter.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(item) = input.recv().await {
                    out.emit(item).await?;
                }
                Ok(())
            }));
        }

        FileStream { rx, tasks }
    }

    /// Next item, or `None` once every producer is done
    pub async fn next(&mut self) -> Option<FileItem> {
        self.rx.recv().await
    }

    /// Wait for every task behind this stream and report the first failure.
    ///
    /// A stage that stops because its consumer went away reports
    /// `StreamClosed`; that is only returned when no task failed for a
    /// better reason.
    pub async fn finish(self) -> Result<(), BuildError> {
        let FileStream { rx, tasks } = self;
        drop(rx);

        let mut closed = None;
        for task in tasks {
            let result = task
                .await
                .map_err(|e| BuildError::Task(e.to_string()))
                .and_then(|r| r);
            match result {
                Ok(()) => {}
                Err(e) if e.is_stream_closed() => {
                    closed.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        match closed {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drain the stream into memory, then surface any task failure
    pub async fn collect(mut self) -> Result<Vec<FileItem>, BuildError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item);
        }
        self.finish().await?;
        Ok(items)
    }
}
