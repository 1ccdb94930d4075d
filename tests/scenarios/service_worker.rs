//! Test: Service worker generation after the output is on disk

use crate::helpers::*;
use assetline::core::BuildConfig;
use assetline::execution::{BuildEngine, BuildEvent};
use assetline::service_worker::SERVICE_WORKER_FILE;
use std::sync::Arc;
use std::time::Duration;

fn with_service_worker() -> BuildConfig {
    BuildConfig {
        add_service_worker: true,
        ..BuildConfig::default()
    }
}

/// A missing config file means defaults plus a notice, never an error
#[tokio::test]
async fn test_missing_config_uses_defaults() {
    let dir = fixture(&[
        ("index.html", "<!doctype html><script src=\"src/app.js\"></script>"),
        ("src/app.js", "run()"),
    ]);
    let project = load_project(dir.path()).await;
    let log = EventLog::default();
    let engine = log.attach(BuildEngine::new(project, build_root(dir.path())));

    let state = engine.build(&with_service_worker()).await.unwrap();
    assert_eq!(state.files_written, 2);

    let missing = log.events().into_iter().find_map(|event| match event {
        BuildEvent::ServiceWorkerConfigMissing { path, .. } => Some(path),
        _ => None,
    });
    assert_eq!(
        missing,
        Some(dir.path().join("sw-precache-config.json"))
    );

    let out = build_root(dir.path()).join("default");
    let script = read(out.join(SERVICE_WORKER_FILE));
    assert!(script.contains("\"src/app.js\""));
    assert!(script.contains("\"index.html\""));
    assert!(script.contains("\"/index.html\""));
}

/// A config file narrows the precached set
#[tokio::test]
async fn test_config_globs_select_files() {
    let dir = fixture(&[
        ("index.html", "<!doctype html><p>hi</p>"),
        ("src/app.js", "run()"),
        ("sw-precache-config.json", r#"{"staticFileGlobs": ["src/*"], "cacheId": "shop"}"#),
    ]);
    let project = load_project(dir.path()).await;
    let log = EventLog::default();
    let engine = log.attach(BuildEngine::new(project, build_root(dir.path())));

    engine.build(&with_service_worker()).await.unwrap();

    assert!(!log
        .events()
        .iter()
        .any(|event| matches!(event, BuildEvent::ServiceWorkerConfigMissing { .. })));
    let script = read(build_root(dir.path()).join("default").join(SERVICE_WORKER_FILE));
    assert!(script.contains("[\"src/app.js\""));
    assert!(!script.contains("[\"index.html\""));
    assert!(script.contains("\"shop-"));
}

/// Generation waits until the writer has fully finished
#[tokio::test]
async fn test_generation_waits_for_slow_writer() {
    let dir = fixture(&[
        ("index.html", "<!doctype html><p>hi</p>"),
        ("src/app.js", "run()"),
        ("src/style.css", "p { color: red; }"),
    ]);
    let project = load_project(dir.path()).await;
    let writer = SlowWriter::new(Duration::from_millis(100));
    let generator = Arc::new(RecordingGenerator::new(writer.finished_flag()));
    let engine = BuildEngine::new(project, build_root(dir.path()))
        .with_writer(Arc::new(writer))
        .with_sw_generator(generator.clone());

    engine.build(&with_service_worker()).await.unwrap();

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].writer_finished);
    assert!(!calls[0].had_config);
    assert_eq!(
        calls[0].files,
        vec!["index.html", "src/app.js", "src/style.css"]
    );
}
