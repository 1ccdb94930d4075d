//! Test: Files pass through an unoptimized build unchanged

use crate::helpers::*;
use assetline::core::{BuildConfig, BuildPhase};
use assetline::execution::{BuildDriver, BuildEngine};
use std::sync::Arc;

const INDEX: &str = r#"<!doctype html>
<html>
<head>
  <style>
    body { margin: 0; }
  </style>
</head>
<body>
  <script src="src/app.js"></script>
  <script>
    window.ready = true;
  </script>
</body>
</html>
"#;

/// Two files in, exactly two files out, byte for byte
#[tokio::test]
async fn test_two_files_in_two_files_out() {
    let dir = fixture(&[("index.html", INDEX), ("src/app.js", "run();\n")]);
    let project = load_project(dir.path()).await;
    let engine = BuildEngine::new(project, build_root(dir.path()));

    let state = engine.build(&BuildConfig::default()).await.unwrap();

    assert_eq!(state.phase, BuildPhase::Complete);
    assert_eq!(state.files_written, 2);
    let out = build_root(dir.path()).join("default");
    assert_eq!(files_under(&out), vec!["index.html", "src/app.js"]);
    assert_eq!(read(out.join("index.html")), INDEX);
    assert_eq!(read(out.join("src/app.js")), "run();\n");
}

/// Old output under the build root is gone after a driver run
#[tokio::test]
async fn test_driver_replaces_previous_output() {
    let dir = fixture(&[
        ("index.html", "<!doctype html><p>hi</p>"),
        ("build/stale/old.html", "old"),
    ]);
    let project = load_project(dir.path()).await;
    let root = build_root(dir.path());
    let engine = BuildEngine::new(project, &root);
    let driver = BuildDriver::new(Arc::new(engine), &root);

    let states = driver.run(vec![named("fresh")]).await.unwrap();

    assert_eq!(states.len(), 1);
    assert_eq!(files_under(&root), vec!["fresh/index.html"]);
}
