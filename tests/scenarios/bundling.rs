//! Test: Bundled builds inline local scripts and stylesheets

use crate::helpers::*;
use assetline::core::BuildConfig;
use assetline::execution::BuildEngine;

#[tokio::test]
async fn test_bundle_inlines_and_drops_assets() {
    let dir = fixture(&[
        (
            "index.html",
            r#"<!doctype html><html><head><link rel="stylesheet" href="src/style.css"></head><body><script src="src/app.js"></script></body></html>"#,
        ),
        ("src/app.js", "run()"),
        ("src/style.css", "p{color:red}"),
        ("src/logo.png", "png"),
    ]);
    let project = load_project(dir.path()).await;
    let engine = BuildEngine::new(project, build_root(dir.path()));

    let config = BuildConfig {
        name: Some("bundled".to_string()),
        bundle: true,
        ..BuildConfig::default()
    };
    engine.build(&config).await.unwrap();

    let out = build_root(dir.path()).join("bundled");
    assert_eq!(files_under(&out), vec!["index.html", "src/logo.png"]);

    let index = read(out.join("index.html"));
    assert!(index.contains("<style>p{color:red}</style>"));
    assert!(index.contains("<script>run()</script>"));
    assert!(!index.contains("src/app.js"));
}
